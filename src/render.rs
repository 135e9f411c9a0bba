use crate::model::{Gauges, PetState};
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
    pub(crate) bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
            bold: false,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            c.ch = ' ';
            c.fg = Color::White;
            c.bg = bg;
            c.bold = false;
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   UI overlay (text + meters)
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg,
                bold: false,
            },
        );
    }
}

fn bar(value01: f32, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f32 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

fn gauge_color(value: f32, enable_color: bool) -> Color {
    if !enable_color {
        return Color::White;
    }
    if value > 60.0 {
        Color::Green
    } else if value > 30.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Everything the overlay needs, read out of the session each frame.
pub(crate) struct StatusView<'a> {
    pub(crate) state: PetState,
    pub(crate) gauges: &'a Gauges,
    pub(crate) recording: bool,
    pub(crate) clip_secs: Option<f32>,
    pub(crate) can_feed: bool,
    pub(crate) can_record: bool,
    pub(crate) can_play: bool,
    pub(crate) message: Option<&'a str>,
}

fn caption(state: PetState, recording: bool) -> &'static str {
    if recording {
        return "Listening...";
    }
    match state {
        PetState::Idle => "Ready to play!",
        PetState::Talking => "Talking...",
        PetState::Happy => "Happy!",
        PetState::Eating => "Eating...",
        PetState::Sleeping => "Sleeping...",
    }
}

pub(crate) fn ui_overlay(buf: &mut CellBuffer, view: &StatusView, enable_color: bool) {
    let bg = Color::Black;
    let fg = Color::White;

    draw_text(buf, 1, 0, "ChatterCat", fg, bg);

    let g = view.gauges;
    let lines = [
        ("Hunger", g.hunger()),
        ("Happy ", g.happiness()),
        ("Energy", g.energy()),
    ];
    for (i, (name, val)) in lines.iter().enumerate() {
        let b = bar(*val / 100.0, 14);
        let s = format!("{name}: {b} {:>5.1}", val);
        draw_text(buf, 1, 2 + i as u16, &s, gauge_color(*val, enable_color), bg);
    }

    draw_text(buf, 1, 6, caption(view.state, view.recording), fg, bg);

    let clip_line = match view.clip_secs {
        Some(secs) => format!("Clip: {secs:.1}s"),
        None => "Clip: none".to_string(),
    };
    draw_text(buf, 1, 7, &clip_line, fg, bg);

    let avail = format!(
        "Feed {} | Record {} | Play {}",
        if view.can_feed { "ok" } else { "--" },
        if view.can_record { "ok" } else { "--" },
        if view.can_play { "ok" } else { "--" },
    );
    draw_text(buf, 1, 8, &avail, fg, bg);

    if let Some(msg) = view.message {
        let mfg = if enable_color { Color::Yellow } else { fg };
        draw_text(buf, 1, 10, msg, mfg, bg);
    }

    let help = if view.recording {
        "Keys: r stop | q quit | h help"
    } else {
        "Keys: p pet | f feed | r record | v play voice | s sleep/wake | h help | q quit"
    };
    draw_text(buf, 1, buf.h.saturating_sub(1), help, fg, bg);
}

/* -----------------------------
   Cat sprite
------------------------------ */

/// Small vertical bob while the cat is animated.
pub(crate) fn bounce_offset(state: PetState, now_ms: u64) -> i32 {
    match state {
        PetState::Happy | PetState::Talking | PetState::Eating => {
            if (now_ms / 250) % 2 == 0 {
                0
            } else {
                -1
            }
        }
        _ => 0,
    }
}

pub(crate) fn draw_cat(buf: &mut CellBuffer, state: PetState, cx: i32, cy: i32) {
    let bg = Color::Black;
    let fg = Color::White;

    let (w, h) = (17i32, 9i32);
    let x0 = cx - w / 2;
    let y0 = cy - h / 2;

    let grid: [&str; 9] = match state {
        PetState::Sleeping => [
            "  /\\_____/\\  Zzz ",
            " /         \\     ",
            "|   -   -   |    ",
            "|     w     |    ",
            "|   \\___/   |    ",
            " \\         /     ",
            "  \\_______/      ",
            "                 ",
            "                 ",
        ],
        PetState::Happy => [
            "  /\\_____/\\      ",
            " /         \\     ",
            "|   ^   ^   |    ",
            "|     w     |    ",
            "|   \\___/   |    ",
            " \\         /     ",
            "  \\_______/      ",
            "                 ",
            "                 ",
        ],
        PetState::Talking => [
            "  /\\_____/\\   ..o",
            " /         \\     ",
            "|   o   o   |    ",
            "|     w     |    ",
            "|    (O)    |    ",
            " \\         /     ",
            "  \\_______/      ",
            "                 ",
            "                 ",
        ],
        PetState::Eating => [
            "  /\\_____/\\      ",
            " /         \\     ",
            "|   o   o   |    ",
            "|     w     |    ",
            "|   [===]   |    ",
            " \\         /     ",
            "  \\_______/      ",
            "    nom nom      ",
            "                 ",
        ],
        PetState::Idle => [
            "  /\\_____/\\      ",
            " /         \\     ",
            "|   o   o   |    ",
            "|     w     |    ",
            "|   \\___/   |    ",
            " \\         /     ",
            "  \\_______/      ",
            "                 ",
            "                 ",
        ],
    };

    for (yy, line) in grid.iter().enumerate() {
        let y = y0 + yy as i32;
        if y < 0 || y >= buf.h as i32 {
            continue;
        }
        let mut x = x0;
        for ch in line.chars() {
            if ch != ' ' && x >= 0 && x < buf.w as i32 {
                buf.set(
                    x as u16,
                    y as u16,
                    Cell {
                        ch,
                        fg,
                        bg,
                        bold: false,
                    },
                );
            }
            x += 1;
        }
    }
}
