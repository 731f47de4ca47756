//! Small pure text helpers.
//!
//! Every helper counts `char`s, never bytes, so multi-byte text is never split
//! mid-scalar.

/// First `max` characters of `s`.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `max` characters of `s`.
#[must_use]
pub fn tail_chars(s: &str, max: usize) -> &str {
    let total = s.chars().count();
    if total <= max {
        return s;
    }
    match s.char_indices().nth(total - max) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Keep up to `max_content` characters, then append `suffix` if anything was cut.
///
/// The suffix does NOT count toward the budget.
#[must_use]
pub fn truncate_preview(raw: &str, max_content: usize, suffix: &str) -> String {
    let head = truncate_chars(raw, max_content);
    if head.len() == raw.len() {
        raw.to_string()
    } else {
        format!("{head}{suffix}")
    }
}
