/// Keys the session reacts to besides plain typing

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Enter,
    Escape,
    Delete,
    Space,
    /// Ctrl+Up
    CycleForward,
    /// Ctrl+Down
    CycleBackward,
    /// Ctrl+Left
    PagePrev,
    /// Ctrl+Right
    PageNext,
}

impl Key {
    /// Map a terminal key event. `None` for keys that are just typing.
    pub fn from_event(event: &KeyEvent) -> Option<Key> {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);

        let key = match event.code {
            KeyCode::Up if ctrl => Key::CycleForward,
            KeyCode::Down if ctrl => Key::CycleBackward,
            KeyCode::Left if ctrl => Key::PagePrev,
            KeyCode::Right if ctrl => Key::PageNext,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Escape,
            KeyCode::Delete => Key::Delete,
            KeyCode::Char(' ') if !ctrl => Key::Space,
            _ => return None,
        };
        Some(key)
    }
}
