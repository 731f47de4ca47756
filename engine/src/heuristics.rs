//! Local keyword heuristics.
//!
//! A cheap, offline signal added on top of the remote verdict. Phrases are
//! matched as case-insensitive substrings of the subject or body, so
//! "urgently" counts as "urgent".

use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use becwatch_types::{Email, HeuristicResult};

/// Phrases typical of payment-redirection and CEO-fraud emails.
pub const URGENCY_KEYWORDS: [&str; 6] = [
    "urgent",
    "immediate",
    "wire transfer",
    "bank details",
    "confidential",
    "secret",
];

pub const URGENCY_REASON: &str = "Contains urgency keywords";

fn matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(URGENCY_KEYWORDS)
            .expect("valid keyword automaton")
    })
}

/// Score `email` against [`URGENCY_KEYWORDS`].
///
/// Each distinct phrase found anywhere in subject or body adds one point,
/// capped at 3.
#[must_use]
pub fn score_heuristics(email: &Email) -> HeuristicResult {
    let mut seen = [false; URGENCY_KEYWORDS.len()];
    for text in [email.subject.as_str(), email.body.as_str()] {
        for m in matcher().find_overlapping_iter(text) {
            seen[m.pattern().as_usize()] = true;
        }
    }

    let mut result = HeuristicResult::empty();
    for _ in seen.iter().filter(|hit| **hit) {
        result.add_hit(URGENCY_REASON);
    }
    result
}
