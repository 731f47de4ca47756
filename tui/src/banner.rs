//! In-page warning banner.

use std::io::Write;

use crossterm::{
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor},
};

use becwatch_engine::{BANNER_ID, Banner, BannerPlacement};
use becwatch_types::{RiskTier, sanitize_terminal_text};

const ICON: &str = "⚠️";

/// Write the banner to a plain terminal stream (watch mode).
///
/// The tag line carries the banner id and placement so a reader of the log can
/// tell which banner slot the next warning replaces.
pub fn print_banner(
    out: &mut impl Write,
    banner: &Banner,
    placement: BannerPlacement,
) -> std::io::Result<()> {
    let color = match banner.tier {
        RiskTier::High => crossterm::style::Color::Red,
        RiskTier::Medium | RiskTier::Low => crossterm::style::Color::DarkYellow,
    };
    queue!(
        out,
        SetForegroundColor(color),
        SetAttribute(Attribute::Bold),
        Print(format!("{ICON} {}", banner.title())),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print(format!("  [{BANNER_ID} @ {}]\n", placement.as_str())),
        Print(format!("   {}\n", sanitize_terminal_text(&banner.reason))),
    )?;
    out.flush()
}
