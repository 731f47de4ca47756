//! View models for the in-page banner and the popup panel.
//!
//! Rendering lives in the TUI crate; everything here is plain data so hosts
//! other than the terminal can draw the same content.

use std::fmt;

use becwatch_types::{
    Analysis, PersistedState, RiskTier, RuntimeMessage, text::truncate_preview,
};
use chrono::{DateTime, Local, Utc};
use scraper::Html;

use crate::extractor::PageSelectors;
use crate::storage::StorageError;

/// DOM id a host gives the banner so the next one replaces it.
pub const BANNER_ID: &str = "bec-warning-banner";

pub const POPUP_BODY_CHARS: usize = 500;
pub const POPUP_NO_SUBJECT: &str = "(No subject)";
pub const POPUP_NO_CONTENT: &str = "(No content)";
pub const ANALYZING: &str = "Analyzing...";
pub const NO_SCORE: &str = "No score available";
pub const LOAD_ERROR: &str = "Error loading data";
pub const NEVER_UPDATED: &str = "Never updated";

// ============================================================================
// Banner
// ============================================================================

/// Warning shown inside the page for a medium or high risk email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub tier: RiskTier,
    pub score: u8,
    pub reason: String,
}

impl Banner {
    /// `None` for low-risk analyses.
    #[must_use]
    pub fn for_analysis(analysis: &Analysis) -> Option<Self> {
        let tier = analysis.tier();
        (tier != RiskTier::Low).then(|| Self {
            tier,
            score: analysis.score,
            reason: analysis.reason.clone(),
        })
    }

    #[must_use]
    pub fn headline(&self) -> &'static str {
        match self.tier {
            RiskTier::High => "HIGH RISK DETECTED",
            RiskTier::Medium | RiskTier::Low => "POTENTIAL RISK DETECTED",
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        format!("{} (Score: {}/10)", self.headline(), self.score)
    }
}

/// Where a host should insert the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerPlacement {
    /// Immediately after the subject heading.
    BelowSubject,
    /// First child of the message body.
    TopOfBody,
    /// First child of the document body.
    DocumentRoot,
}

impl BannerPlacement {
    #[must_use]
    pub fn choose(html: &str, selectors: &PageSelectors) -> Self {
        let document = Html::parse_document(html);
        let subject_has_parent = document
            .select(&selectors.subject)
            .next()
            .is_some_and(|el| el.parent().is_some());

        if subject_has_parent {
            Self::BelowSubject
        } else if document.select(&selectors.body).next().is_some() {
            Self::TopOfBody
        } else {
            Self::DocumentRoot
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelowSubject => "below_subject",
            Self::TopOfBody => "top_of_body",
            Self::DocumentRoot => "document_root",
        }
    }
}

/// Host surface that displays the banner.
///
/// Each call replaces whatever banner the previous call put up.
pub trait BannerSink: Send {
    fn replace(&mut self, banner: Banner);
}

/// Keeps only the most recent banner.
#[derive(Debug, Default)]
pub struct LatestBanner {
    current: Option<Banner>,
    shown: usize,
}

impl LatestBanner {
    #[must_use]
    pub fn current(&self) -> Option<&Banner> {
        self.current.as_ref()
    }

    /// How many banners were put up in total.
    #[must_use]
    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl BannerSink for LatestBanner {
    fn replace(&mut self, banner: Banner) {
        self.current = Some(banner);
        self.shown += 1;
    }
}

// ============================================================================
// Popup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreLine {
    Scored { score: u8, reason: String },
    Analyzing,
    NoScore,
    LoadError,
}

impl ScoreLine {
    /// Severity styling, only for scored lines.
    #[must_use]
    pub fn tier(&self) -> Option<RiskTier> {
        match self {
            Self::Scored { score, .. } => Some(RiskTier::from_score(*score)),
            _ => None,
        }
    }
}

impl fmt::Display for ScoreLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored { score, reason } => write!(f, "Score: {score}/10 - {reason}"),
            Self::Analyzing => f.write_str(ANALYZING),
            Self::NoScore => f.write_str(NO_SCORE),
            Self::LoadError => f.write_str(LOAD_ERROR),
        }
    }
}

/// Everything the popup panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub subject: String,
    pub body: String,
    pub score: ScoreLine,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for PopupView {
    fn default() -> Self {
        Self::from_state(None)
    }
}

impl PopupView {
    #[must_use]
    pub fn from_state(state: Option<&PersistedState>) -> Self {
        let Some(state) = state else {
            return Self {
                subject: POPUP_NO_SUBJECT.to_string(),
                body: POPUP_NO_CONTENT.to_string(),
                score: ScoreLine::NoScore,
                last_updated: None,
            };
        };

        Self {
            subject: non_empty_or(&state.last_email.subject, POPUP_NO_SUBJECT),
            body: if state.last_email.body.is_empty() {
                POPUP_NO_CONTENT.to_string()
            } else {
                truncate_preview(&state.last_email.body, POPUP_BODY_CHARS, "...")
            },
            score: ScoreLine::Scored {
                score: state.last_score,
                reason: state.last_reason.clone(),
            },
            last_updated: Some(state.last_updated),
        }
    }

    /// Apply the outcome of reading the local store.
    ///
    /// A failed read keeps the rest of the panel and only flags the score line.
    pub fn apply_load(&mut self, loaded: Result<Option<PersistedState>, StorageError>) {
        match loaded {
            Ok(state) => *self = Self::from_state(state.as_ref()),
            Err(e) => {
                tracing::error!("Failed to load popup data: {e}");
                self.score = ScoreLine::LoadError;
            }
        }
    }

    /// Apply a live runtime message.
    pub fn apply_message(&mut self, message: &RuntimeMessage) {
        match message {
            RuntimeMessage::NewEmailDetected { subject, preview } => {
                self.subject.clone_from(subject);
                self.body.clone_from(preview);
                self.score = ScoreLine::Analyzing;
            }
            RuntimeMessage::EmailAnalysisComplete(analysis) => {
                self.score = ScoreLine::Scored {
                    score: analysis.score,
                    reason: analysis.reason.clone(),
                };
            }
            RuntimeMessage::NewEmail(_) => {}
        }
    }

    /// `Last updated: …` in local time.
    #[must_use]
    pub fn updated_line(&self) -> String {
        match self.last_updated {
            Some(at) => format!(
                "Last updated: {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ),
            None => format!("Last updated: {NEVER_UPDATED}"),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
