//! Color theme for the becwatch panels.
//!
//! Uses Kanagawa Wave palette by default with an optional high-contrast override.

use ratatui::style::{Color, Modifier, Style};

use becwatch_types::RiskTier;

/// Kanagawa Wave color palette constants.
mod colors {
    use super::Color;

    // === Backgrounds (Sumi Ink) ===
    pub const BG_DARK: Color = Color::Rgb(22, 22, 29); // sumiInk0
    pub const BG_PANEL: Color = Color::Rgb(31, 31, 40); // sumiInk3
    pub const BG_BORDER: Color = Color::Rgb(84, 84, 109); // sumiInk6

    // === Foregrounds (Fuji) ===
    pub const TEXT_PRIMARY: Color = Color::Rgb(220, 215, 186); // fujiWhite
    pub const TEXT_SECONDARY: Color = Color::Rgb(200, 192, 147); // oldWhite
    pub const TEXT_MUTED: Color = Color::Rgb(114, 113, 105); // fujiGray

    // === Accents ===
    pub const PRIMARY: Color = Color::Rgb(149, 127, 184); // oniViolet
    pub const GREEN: Color = Color::Rgb(152, 187, 108); // springGreen
    pub const ORANGE: Color = Color::Rgb(255, 160, 102); // surimiOrange
    pub const RED: Color = Color::Rgb(255, 93, 98); // peachRed
}

/// Resolved theme palette used by the UI.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bg_dark: Color,
    pub bg_panel: Color,
    pub bg_border: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,
    pub primary: Color,
    pub risk_low: Color,
    pub risk_medium: Color,
    pub risk_high: Color,
}

impl Palette {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            bg_dark: colors::BG_DARK,
            bg_panel: colors::BG_PANEL,
            bg_border: colors::BG_BORDER,
            text_primary: colors::TEXT_PRIMARY,
            text_secondary: colors::TEXT_SECONDARY,
            text_muted: colors::TEXT_MUTED,
            primary: colors::PRIMARY,
            risk_low: colors::GREEN,
            risk_medium: colors::ORANGE,
            risk_high: colors::RED,
        }
    }

    #[must_use]
    pub fn high_contrast() -> Self {
        Self {
            bg_dark: Color::Black,
            bg_panel: Color::Black,
            bg_border: Color::Gray,
            text_primary: Color::White,
            text_secondary: Color::Gray,
            text_muted: Color::DarkGray,
            primary: Color::White,
            risk_low: Color::Green,
            risk_medium: Color::Yellow,
            risk_high: Color::Red,
        }
    }

    #[must_use]
    pub fn tier(&self, tier: RiskTier) -> Color {
        match tier {
            RiskTier::Low => self.risk_low,
            RiskTier::Medium => self.risk_medium,
            RiskTier::High => self.risk_high,
        }
    }
}

#[must_use]
pub fn palette(high_contrast: bool) -> Palette {
    if high_contrast {
        Palette::high_contrast()
    } else {
        Palette::standard()
    }
}

/// Pre-defined styles for common UI elements.
pub mod styles {
    use becwatch_types::RiskTier;

    use super::{Modifier, Palette, Style};

    #[must_use]
    pub fn title(palette: &Palette) -> Style {
        Style::default()
            .fg(palette.primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Score line; unscored lines stay neutral.
    #[must_use]
    pub fn score(palette: &Palette, tier: Option<RiskTier>) -> Style {
        match tier {
            Some(tier) => Style::default()
                .fg(palette.tier(tier))
                .add_modifier(Modifier::BOLD),
            None => Style::default().fg(palette.text_secondary),
        }
    }

    #[must_use]
    pub fn key_hint(palette: &Palette) -> Style {
        Style::default().fg(palette.text_muted)
    }

    #[must_use]
    pub fn key_highlight(palette: &Palette) -> Style {
        Style::default()
            .fg(palette.risk_medium)
            .add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use becwatch_types::RiskTier;
    use ratatui::style::Color;

    use super::{Palette, palette, styles};

    #[test]
    fn tiers_map_to_distinct_colors() {
        let p = Palette::standard();
        assert_ne!(p.tier(RiskTier::Low), p.tier(RiskTier::Medium));
        assert_ne!(p.tier(RiskTier::Medium), p.tier(RiskTier::High));
    }

    #[test]
    fn high_contrast_uses_named_colors() {
        let p = palette(true);
        assert_eq!(p.tier(RiskTier::High), Color::Red);
        assert_eq!(p.text_primary, Color::White);
    }

    #[test]
    fn unscored_line_is_neutral() {
        let p = Palette::standard();
        assert_eq!(styles::score(&p, None).fg, Some(p.text_secondary));
        assert_eq!(
            styles::score(&p, Some(RiskTier::High)).fg,
            Some(p.risk_high)
        );
    }
}
