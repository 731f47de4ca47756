//! Key handling for the popup panel.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupCommand {
    Refresh,
    Quit,
}

/// Map a key press to a popup command.
#[must_use]
pub fn command_for_key(key: KeyEvent) -> Option<PopupCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PopupCommand::Quit)
        }
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(PopupCommand::Quit),
        KeyCode::Char('r' | 'R') | KeyCode::F(5) => Some(PopupCommand::Refresh),
        _ => None,
    }
}

/// Wait up to `timeout` for a key press and translate it.
pub fn poll_command(timeout: Duration) -> Result<Option<PopupCommand>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) => Ok(command_for_key(key)),
        _ => Ok(None),
    }
}
