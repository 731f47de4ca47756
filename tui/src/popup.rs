//! The popup panel: last analyzed email and its score.

use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Wrap},
};

use becwatch_engine::{PersistedState, PopupUpdate, PopupView, StorageError};
use becwatch_types::sanitize_terminal_text;

use crate::theme::{Palette, palette, styles};

/// How long the "Refreshed" confirmation stays up.
pub const REFRESHED_HOLD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshIndicator {
    Idle,
    Refreshing,
    Refreshed { until: Instant },
}

impl RefreshIndicator {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Refresh Data",
            Self::Refreshing => "Refreshing...",
            Self::Refreshed { .. } => "✓ Refreshed",
        }
    }

    #[must_use]
    pub fn accepts_refresh(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Popup state: the view model plus the refresh control.
#[derive(Debug)]
pub struct PopupApp {
    view: PopupView,
    refresh: RefreshIndicator,
    high_contrast: bool,
}

impl PopupApp {
    #[must_use]
    pub fn new(high_contrast: bool) -> Self {
        Self {
            view: PopupView::default(),
            refresh: RefreshIndicator::Idle,
            high_contrast,
        }
    }

    #[must_use]
    pub fn view(&self) -> &PopupView {
        &self.view
    }

    #[must_use]
    pub fn refresh_indicator(&self) -> RefreshIndicator {
        self.refresh
    }

    /// Start a manual refresh. Returns false while a previous one is still showing.
    pub fn begin_refresh(&mut self) -> bool {
        if !self.refresh.accepts_refresh() {
            return false;
        }
        self.refresh = RefreshIndicator::Refreshing;
        true
    }

    pub fn finish_refresh(
        &mut self,
        loaded: Result<Option<PersistedState>, StorageError>,
        now: Instant,
    ) {
        self.view.apply_load(loaded);
        self.refresh = RefreshIndicator::Refreshed {
            until: now + REFRESHED_HOLD,
        };
    }

    /// Initial load and storage-change reloads.
    pub fn load(&mut self, loaded: Result<Option<PersistedState>, StorageError>) {
        self.view.apply_load(loaded);
    }

    /// Apply a reload or live message from the feed.
    pub fn apply(&mut self, update: PopupUpdate) {
        match update {
            PopupUpdate::Reloaded(loaded) => self.view.apply_load(loaded),
            PopupUpdate::Message(message) => self.view.apply_message(&message),
        }
    }

    /// Expire the refresh confirmation.
    pub fn tick(&mut self, now: Instant) {
        if let RefreshIndicator::Refreshed { until } = self.refresh
            && now >= until
        {
            self.refresh = RefreshIndicator::Idle;
        }
    }
}

pub fn draw(frame: &mut Frame, app: &PopupApp) {
    let palette = palette(app.high_contrast);
    let area = frame.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.bg_border))
        .style(Style::default().bg(palette.bg_panel))
        .title(Span::styled(" BEC Watch ", styles::title(&palette)))
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Subject
            Constraint::Min(1),    // Body
            Constraint::Length(2), // Score
            Constraint::Length(1), // Timestamp
            Constraint::Length(1), // Keys
        ])
        .split(inner);

    draw_subject(frame, app.view(), chunks[0], &palette);
    draw_body(frame, app.view(), chunks[1], &palette);

    let score = Paragraph::new(Line::from(Span::styled(
        sanitize_terminal_text(&app.view().score.to_string()).into_owned(),
        styles::score(&palette, app.view().score.tier()),
    )))
    .wrap(Wrap { trim: true });
    frame.render_widget(score, chunks[2]);

    let updated = Paragraph::new(Line::from(Span::styled(
        app.view().updated_line(),
        Style::default().fg(palette.text_muted),
    )));
    frame.render_widget(updated, chunks[3]);

    let keys = Paragraph::new(Line::from(vec![
        Span::styled("r", styles::key_highlight(&palette)),
        Span::styled(
            format!(" {}  ", app.refresh_indicator().label()),
            styles::key_hint(&palette),
        ),
        Span::styled("q", styles::key_highlight(&palette)),
        Span::styled(" Quit", styles::key_hint(&palette)),
    ]));
    frame.render_widget(keys, chunks[4]);
}

fn draw_subject(frame: &mut Frame, view: &PopupView, area: Rect, palette: &Palette) {
    let subject = Paragraph::new(Line::from(Span::styled(
        sanitize_terminal_text(&view.subject).into_owned(),
        Style::default()
            .fg(palette.text_primary)
            .add_modifier(Modifier::BOLD),
    )))
    .wrap(Wrap { trim: true });
    frame.render_widget(subject, area);
}

fn draw_body(frame: &mut Frame, view: &PopupView, area: Rect, palette: &Palette) {
    let body = sanitize_terminal_text(&view.body);
    let lines: Vec<Line> = body
        .lines()
        .map(|line| {
            Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(palette.text_secondary),
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}
