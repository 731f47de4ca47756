//! becwatch CLI - binary entry point.
//!
//! # Architecture
//!
//! The CLI bridges [`becwatch_engine`] (pipeline and view models) and
//! [`becwatch_tui`] (rendering). A saved webmail page stands in for the live
//! DOM; the persisted state file is what the popup shows.
//!
//! ```text
//! watch: SnapshotPoller -> PageEvent -> PageContext -> Orchestrator -> state.json
//!                                                         |           |
//!                                     MessageBus -> messages.jsonl    |
//!                                                         |           |
//! popup: PopupFeed (log tail + state mtime poll) <--------+-----------+
//!          -> PopupApp -> ratatui
//! ```

mod args;
mod hardening;
mod popup;
mod runtime;
mod watch;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use becwatch_config::BecwatchConfig;
use becwatch_engine::{ApiKey, PopupView, StateStore};
use becwatch_types::sanitize_terminal_text;

use args::{Command, USAGE};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the popup.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.becwatch/logs/becwatch.log
    if let Some(dir) = becwatch_config::app_dir() {
        candidates.push(dir.join("logs").join("becwatch.log"));
    }

    // Fallback: ./.becwatch/logs/becwatch.log
    candidates.push(
        PathBuf::from(becwatch_config::APP_DIR)
            .join("logs")
            .join("becwatch.log"),
    );

    candidates
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    if let Err(e) = hardening::apply() {
        tracing::warn!("{e:#}");
    }

    let command = Command::parse(std::env::args().skip(1))?;
    let config = match BecwatchConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable config: {e}");
            eprintln!("Warning: {e}");
            BecwatchConfig::default()
        }
    };

    match command {
        Command::Popup => popup::run(&config),
        Command::Show { json } => show(&config, json),
        Command::Scan { page } => watch::scan(&config, &page).await,
        Command::Watch { page, poll } => watch::watch(&config, page, poll).await,
        Command::SetKey(raw) => set_key(&raw),
        Command::Help => {
            print!("{USAGE}");
            Ok(())
        }
        Command::Version => {
            println!("becwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn set_key(raw: &str) -> Result<()> {
    let key = ApiKey::new(raw).context("Please enter a valid API key.")?;
    let path = BecwatchConfig::persist_api_key(&key)?;
    tracing::info!(path = %path.display(), "API key saved");
    println!("Settings saved successfully! ({})", path.display());
    Ok(())
}

fn show(config: &BecwatchConfig, json: bool) -> Result<()> {
    let store = runtime::state_store(config)?;
    let state = store.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let view = PopupView::from_state(state.as_ref());
    println!("Subject: {}", sanitize_terminal_text(&view.subject));
    println!("{}", sanitize_terminal_text(&view.body));
    println!();
    println!("{}", sanitize_terminal_text(&view.score.to_string()));
    println!("{}", view.updated_line());
    if config.google_api_key().is_none() {
        println!("API key: not set (run `becwatch set-key <KEY>`)");
    }
    Ok(())
}
