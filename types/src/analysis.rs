//! Scores produced by the classification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Email;

/// Ceiling of the local heuristic contribution.
pub const MAX_HEURISTIC_SCORE: u8 = 3;

/// Ceiling of the combined (remote + local) score.
pub const MAX_COMBINED_SCORE: u8 = 10;

/// Local keyword scan result.
///
/// `reasons` is de-duplicated and keeps first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicResult {
    score: u8,
    reasons: Vec<String>,
}

impl HeuristicResult {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record one distinct matching phrase.
    pub fn add_hit(&mut self, reason: &str) {
        self.score = self.score.saturating_add(1).min(MAX_HEURISTIC_SCORE);
        if !self.reasons.iter().any(|r| r == reason) {
            self.reasons.push(reason.to_string());
        }
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    #[must_use]
    pub fn fired(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Verdict returned by the remote classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: u8,
    pub reason: String,
}

impl Verdict {
    /// Build a verdict from a raw model score, rounding and clamping into `0..=10`.
    #[must_use]
    pub fn from_raw_score(raw: f64, reason: impl Into<String>) -> Self {
        let score = if raw.is_finite() {
            raw.round().clamp(0.0, f64::from(MAX_COMBINED_SCORE)) as u8
        } else {
            0
        };
        Self {
            score,
            reason: reason.into(),
        }
    }
}

/// Final result of one classification cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub score: u8,
    pub reason: String,
}

impl Analysis {
    /// Merge the remote verdict with the local heuristics.
    ///
    /// Scores add and clamp at 10. Local reasons are appended in parentheses
    /// only when at least one fired.
    #[must_use]
    pub fn combine(verdict: Verdict, heuristics: &HeuristicResult) -> Self {
        let score = verdict
            .score
            .saturating_add(heuristics.score())
            .min(MAX_COMBINED_SCORE);
        let reason = if heuristics.fired() {
            format!(
                "{} (Local Flags: {})",
                verdict.reason,
                heuristics.reasons().join(", ")
            )
        } else {
            verdict.reason
        };
        Self { score, reason }
    }

    #[must_use]
    pub fn tier(&self) -> RiskTier {
        RiskTier::from_score(self.score)
    }
}

/// Severity band shared by the banner, popup, and notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const MEDIUM_THRESHOLD: u8 = 4;
    pub const HIGH_THRESHOLD: u8 = 7;

    #[must_use]
    pub fn from_score(score: u8) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The single slot of persisted state, overwritten on every completed cycle.
///
/// Serialized with the camelCase keys consumers of the local store expect;
/// `lastUpdated` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub last_email: Email,
    pub last_score: u8,
    pub last_reason: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl PersistedState {
    #[must_use]
    pub fn new(email: Email, analysis: &Analysis, at: DateTime<Utc>) -> Self {
        Self {
            last_email: email,
            last_score: analysis.score,
            last_reason: analysis.reason.clone(),
            last_updated: at,
        }
    }

    #[must_use]
    pub fn tier(&self) -> RiskTier {
        RiskTier::from_score(self.last_score)
    }
}
