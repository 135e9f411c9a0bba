use crate::model::Scene;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Pet,
    Feed,
    RecordToggle,
    PlayClip,
    SleepToggle,
    HelpToggle,
    Quit,
}

#[derive(Clone, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
    pub(crate) mods: KeyModifiers,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) => {
                if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                    out.push(InputEvent {
                        key: k.code,
                        mods: k.modifiers,
                    });
                    if out.len() >= 32 {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_command(scene: Scene, ev: &InputEvent) -> Option<Command> {
    if ev.mods.contains(KeyModifiers::CONTROL) && matches!(ev.key, KeyCode::Char('c')) {
        return Some(Command::Quit);
    }

    match ev.key {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Command::Quit),
        KeyCode::Char('h') | KeyCode::Char('H') => return Some(Command::HelpToggle),
        KeyCode::Esc => {
            if scene == Scene::Help {
                return Some(Command::HelpToggle);
            }
            return None;
        }
        _ => {}
    }

    match scene {
        Scene::Main => match ev.key {
            KeyCode::Char('p') | KeyCode::Char('P') => Some(Command::Pet),
            KeyCode::Char('f') | KeyCode::Char('F') => Some(Command::Feed),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::RecordToggle),
            KeyCode::Char('v') | KeyCode::Char('V') => Some(Command::PlayClip),
            KeyCode::Char('s') | KeyCode::Char('S') => Some(Command::SleepToggle),
            _ => None,
        },
        Scene::Help => None,
    }
}
