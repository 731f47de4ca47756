//! `popup`: the full-screen panel over the persisted analysis.
//!
//! The store is re-read when its file changes and the message log is tailed,
//! so a `watch` running in another terminal shows up here live: "Analyzing..."
//! as soon as it sees an email, then the score.

use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use becwatch_config::BecwatchConfig;
use becwatch_engine::PopupFeed;
use becwatch_tui::{PopupApp, PopupCommand, draw_popup, poll_command};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::runtime;

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Raw mode plus alternate screen, restored on drop even after an early return.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        match Terminal::new(CrosstermBackend::new(out)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
                Err(err.into())
            }
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

pub fn run(config: &BecwatchConfig) -> Result<()> {
    let mut feed = PopupFeed::new(runtime::state_store(config)?, runtime::message_tail(config));
    let mut app = PopupApp::new(config.high_contrast());
    app.load(feed.load());

    let mut session = TerminalSession::new()?;
    loop {
        app.tick(Instant::now());
        session.terminal.draw(|frame| draw_popup(frame, &app))?;

        match poll_command(INPUT_POLL_TIMEOUT)? {
            Some(PopupCommand::Quit) => break,
            Some(PopupCommand::Refresh) => {
                if app.begin_refresh() {
                    session.terminal.draw(|frame| draw_popup(frame, &app))?;
                    app.finish_refresh(feed.load(), Instant::now());
                }
            }
            None => {}
        }

        for update in feed.poll() {
            app.apply(update);
        }
    }
    Ok(())
}
