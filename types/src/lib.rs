//! Core domain types for becwatch.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the pipeline.

#![allow(clippy::missing_errors_doc)]

mod analysis;
mod message;
mod sanitize;
pub mod text;

pub use analysis::{
    Analysis, HeuristicResult, MAX_COMBINED_SCORE, MAX_HEURISTIC_SCORE, PersistedState, RiskTier,
    Verdict,
};
pub use message::{RuntimeMessage, TriggerResponse};
pub use sanitize::sanitize_terminal_text;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder subject used when the page has no subject heading.
pub const NO_SUBJECT: &str = "(No Subject)";

/// Number of body characters folded into an email [`Signature`].
pub const SIGNATURE_BODY_CHARS: usize = 100;

/// Number of body characters carried by a `NEW_EMAIL_DETECTED` preview.
pub const PREVIEW_CHARS: usize = 200;

// ============================================================================
// Email
// ============================================================================

/// The email currently displayed by the webmail page.
///
/// Produced fresh per extraction. Only persisted as part of [`PersistedState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Dedup key: subject plus the first 100 characters of the body.
    #[must_use]
    pub fn signature(&self) -> Signature {
        let head = text::truncate_chars(&self.body, SIGNATURE_BODY_CHARS);
        Signature(format!("{}||{head}", self.subject))
    }

    /// Body preview sent with `NEW_EMAIL_DETECTED`: 200 characters plus `...`.
    #[must_use]
    pub fn preview(&self) -> String {
        text::truncate_preview(&self.body, PREVIEW_CHARS, "...")
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// In-memory identity of an extracted email.
///
/// Never persisted; a process restart forgets every signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Overlap policy
// ============================================================================

/// What a trigger arriving during an in-flight classification does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Ignore it; the next mutation burst after the flight re-checks.
    #[default]
    Drop,
    /// Remember one pending re-check and run it when the flight ends.
    ReplacePending,
}

// ============================================================================
// API Key
// ============================================================================

/// Key for the hosted generation API.
///
/// `Debug` is manually implemented so the key never lands in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

#[derive(Debug, Error)]
#[error("API key must not be empty")]
pub struct EmptyApiKeyError;

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyApiKeyError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            Err(EmptyApiKeyError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
