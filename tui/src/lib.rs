//! TUI rendering for becwatch using ratatui.

mod banner;
mod input;
mod popup;
mod theme;

pub use banner::print_banner;
pub use input::{PopupCommand, command_for_key, poll_command};
pub use popup::{PopupApp, REFRESHED_HOLD, RefreshIndicator, draw as draw_popup};
pub use theme::{Palette, palette, styles};
