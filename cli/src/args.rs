//! Command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const DEFAULT_POLL: Duration = Duration::from_millis(250);

pub const USAGE: &str = "\
becwatch - Business Email Compromise watch for webmail

USAGE:
    becwatch [COMMAND]

COMMANDS:
    popup                        Show the last analysis (default)
    show [--json]                Print the last analysis
    scan <PAGE.html>             Classify the email in a saved page once
    watch <PAGE.html> [--poll-ms <N>]
                                 Re-classify whenever the saved page changes
    set-key <KEY>                Save the Gemini API key
    help                         Show this message
    version                      Show the version
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Popup,
    Show { json: bool },
    Scan { page: PathBuf },
    Watch { page: PathBuf, poll: Duration },
    SetKey(String),
    Help,
    Version,
}

impl Command {
    /// Parse arguments, program name excluded.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            return Ok(Self::Popup);
        };

        let parsed = match command.as_str() {
            "popup" => Self::Popup,
            "show" => match args.next().as_deref() {
                None => Self::Show { json: false },
                Some("--json") => Self::Show { json: true },
                Some(other) => bail!("unexpected argument `{other}` for `show`"),
            },
            "scan" => Self::Scan {
                page: required_path(args.next(), "scan")?,
            },
            "watch" => {
                let page = required_path(args.next(), "watch")?;
                let poll = match args.next().as_deref() {
                    None => DEFAULT_POLL,
                    Some("--poll-ms") => parse_poll(args.next())?,
                    Some(other) => bail!("unexpected argument `{other}` for `watch`"),
                };
                Self::Watch { page, poll }
            }
            "set-key" => match args.next() {
                Some(key) if !key.trim().is_empty() => Self::SetKey(key),
                _ => bail!("Please enter a valid API key."),
            },
            "help" | "-h" | "--help" => Self::Help,
            "version" | "-V" | "--version" => Self::Version,
            other => bail!("unknown command `{other}`\n\n{USAGE}"),
        };

        if let Some(extra) = args.next() {
            bail!("unexpected argument `{extra}`");
        }
        Ok(parsed)
    }
}

fn required_path(arg: Option<String>, command: &str) -> Result<PathBuf> {
    arg.map(PathBuf::from)
        .with_context(|| format!("`{command}` needs the path of a saved webmail page"))
}

fn parse_poll(arg: Option<String>) -> Result<Duration> {
    let raw = arg.context("`--poll-ms` needs a value")?;
    let ms: u64 = raw
        .parse()
        .with_context(|| format!("invalid `--poll-ms` value `{raw}`"))?;
    if ms == 0 {
        bail!("`--poll-ms` must be positive");
    }
    Ok(Duration::from_millis(ms))
}
