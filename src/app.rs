use crate::audio::{CpalInput, CpalOutput};
use crate::config::{load_settings, project_paths, save_settings_atomic, Paths, Settings};
use crate::input::{collect_input_nonblocking, map_event_to_command, Command};
use crate::model::{PetState, Scene};
use crate::render::{bounce_offset, draw_cat, draw_text, ui_overlay, Cell, StatusView, Terminal};
use crate::session::Session;
use std::cmp::{max, min};
use std::path::Path;
use std::time::{Duration, Instant};

pub(crate) struct App {
    settings: Settings,
    paths: Paths,
    session: Session<CpalInput, CpalOutput>,
    term: Terminal,
    scene: Scene,
    message: Option<String>,
    started: Instant,
    should_quit: bool,
}

impl App {
    fn init() -> anyhow::Result<Self> {
        let paths = project_paths()?;
        init_logging(&paths.log_path);

        let settings = load_settings(&paths.settings_path);
        let input = CpalInput::new(settings.device_pattern.clone(), settings.sample_rate);
        let session = Session::new(input, CpalOutput, settings.playback_rate);

        let term = Terminal::begin()?;

        Ok(Self {
            settings,
            paths,
            session,
            term,
            scene: Scene::Main,
            message: None,
            started: Instant::now(),
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let _resized = self.term.resize_if_needed()?;

            let events = collect_input_nonblocking(frame_dt)?;
            for ev in events {
                if let Some(cmd) = map_event_to_command(self.scene, &ev) {
                    self.apply_command(cmd);
                    if self.should_quit {
                        break;
                    }
                }
            }

            // The sim replays its own decay ticks and revert timers from
            // the wall-clock position, so a plain advance per frame is
            // enough.
            let now_ms = self.started.elapsed().as_millis() as u64;
            self.session.advance(now_ms);

            self.render_frame(now_ms)?;

            spin_sleep(frame_dt, Instant::now());
        }

        // Dropping the session releases any open capture/playback stream.
        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        Ok(())
    }

    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Quit => {
                self.should_quit = true;
            }
            Command::HelpToggle => {
                self.scene = match self.scene {
                    Scene::Help => Scene::Main,
                    Scene::Main => Scene::Help,
                };
            }
            Command::Pet => {
                self.session.pet();
                self.message = None;
            }
            Command::Feed => {
                self.session.feed();
                self.message = None;
            }
            Command::SleepToggle => {
                if self.session.state() == PetState::Sleeping {
                    self.session.wake_up();
                } else {
                    self.session.put_to_sleep();
                }
                self.message = None;
            }
            Command::RecordToggle => {
                if self.session.is_recording() {
                    self.session.stop_recording();
                    self.message = None;
                } else {
                    match self.session.start_recording() {
                        Ok(()) => self.message = None,
                        Err(e) => {
                            log::warn!("recording refused: {e}");
                            self.message = Some(e.to_string());
                        }
                    }
                }
            }
            Command::PlayClip => match self.session.play_recording() {
                Ok(()) => self.message = None,
                Err(e) => {
                    log::warn!("playback refused: {e}");
                    self.message = Some(e.to_string());
                }
            },
        }
    }

    fn render_frame(&mut self, now_ms: u64) -> anyhow::Result<()> {
        let bg = crossterm::style::Color::Black;
        self.term.cur.clear(bg);

        let view = StatusView {
            state: self.session.state(),
            gauges: self.session.gauges(),
            recording: self.session.is_recording(),
            clip_secs: self.session.clip_secs(),
            can_feed: self.session.can_feed(),
            can_record: self.session.can_record(),
            can_play: self.session.can_play(),
            message: self.message.as_deref(),
        };

        // Left panel holds text; the cat gets the rest.
        let cols = self.term.cols as i32;
        let rows = self.term.rows as i32;
        let panel_w = min(max(26, cols / 3), cols - 10);
        let cat_cx = panel_w + (cols - panel_w) / 2;
        let cat_cy = rows / 2 + bounce_offset(view.state, now_ms);

        ui_overlay(&mut self.term.cur, &view, self.settings.enable_color);
        draw_cat(&mut self.term.cur, view.state, cat_cx, cat_cy);

        if self.scene == Scene::Help {
            self.draw_center_box(
                "How to play",
                "Keep your cat fed, happy and rested.\n\
    Stats drain whenever you ignore it for a while.\n\n\
    P Pet: +happiness, +energy.\n\
    F Feed: +hunger, +happiness (refused when full).\n\
    R Record: talk into the mic; R again to stop.\n\
    V Play: the cat repeats you in its squeaky voice.\n\
    S Sleep/Wake: energy recovers while sleeping.\n\n\
    The cat falls asleep on its own when energy runs low\n\
    and wakes once it has rested enough.\n\n\
    Esc or H to close help.",
            )?;
        }

        self.term.present(true)?;
        Ok(())
    }

    fn draw_center_box(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
        let fg = crossterm::style::Color::White;
        let bg = crossterm::style::Color::Black;

        let w = self.term.cols;
        let h = self.term.rows;
        let bw = min(58, w.saturating_sub(4));
        let bh = min(18, h.saturating_sub(4));
        let x0 = (w - bw) / 2;
        let y0 = (h - bh) / 2;

        let cell = |ch| Cell {
            ch,
            fg,
            bg,
            bold: false,
        };

        for x in x0..x0 + bw {
            self.term.cur.set(x, y0, cell('─'));
            self.term.cur.set(x, y0 + bh - 1, cell('─'));
        }
        for y in y0..y0 + bh {
            self.term.cur.set(x0, y, cell('│'));
            self.term.cur.set(x0 + bw - 1, y, cell('│'));
        }
        self.term.cur.set(x0, y0, cell('┌'));
        self.term.cur.set(x0 + bw - 1, y0, cell('┐'));
        self.term.cur.set(x0, y0 + bh - 1, cell('└'));
        self.term.cur.set(x0 + bw - 1, y0 + bh - 1, cell('┘'));

        draw_text(&mut self.term.cur, x0 + 2, y0 + 1, title, fg, bg);

        let mut yy = y0 + 3;
        for line in body.lines() {
            if yy >= y0 + bh - 1 {
                break;
            }
            draw_text(&mut self.term.cur, x0 + 2, yy, line.trim_start(), fg, bg);
            yy += 1;
        }

        Ok(())
    }
}

pub(crate) fn run() -> anyhow::Result<()> {
    let mut app = App::init()?;
    app.run()?;
    Ok(())
}

/// The TUI owns the terminal, so logs go to a file instead of stderr.
fn init_logging(path: &Path) {
    let Ok(file) = std::fs::File::create(path) else {
        return;
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.target(env_logger::Target::Pipe(Box::new(file)));
    let _ = builder.try_init();
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
