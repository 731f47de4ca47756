//! PII redaction for text leaving the machine.
//!
//! Email bodies are scrubbed of addresses, payment-card numbers, and phone
//! numbers before they are sent to the remote classifier. Redaction is
//! best-effort: it never fails and never rejects input.

use std::sync::OnceLock;

use regex::Regex;

pub const EMAIL_PLACEHOLDER: &str = "[EMAIL_REDACTED]";
pub const CARD_PLACEHOLDER: &str = "[CREDIT_CARD_REDACTED]";
pub const PHONE_PLACEHOLDER: &str = "[PHONE_REDACTED]";

/// Replace PII in `raw` with fixed placeholders.
///
/// Email addresses, then card numbers (13-19 digits, optionally grouped by
/// spaces or dashes), then US-style phone numbers. The passes repeat until
/// none of the patterns match the output.
///
/// ```
/// use becwatch_utils::redact_pii;
///
/// assert_eq!(
///     redact_pii("Mail ceo@corp.example or call 555-123-4567"),
///     "Mail [EMAIL_REDACTED] or call [PHONE_REDACTED]",
/// );
/// ```
#[must_use]
pub fn redact_pii(raw: &str) -> String {
    pii_redactor().redact(raw)
}

/// Mask Google API keys (`AIza...`) in diagnostic text.
#[must_use]
pub fn redact_api_keys(raw: &str) -> String {
    let mut output = raw.to_string();
    apply_if_match(&pii_redactor().google_key, "AIza***", &mut output);
    output
}

static PII_REDACTOR: OnceLock<PiiRedactor> = OnceLock::new();

fn pii_redactor() -> &'static PiiRedactor {
    PII_REDACTOR.get_or_init(PiiRedactor::new)
}

#[derive(Debug)]
struct PiiRedactor {
    email: Regex,
    card: Regex,
    phone: Regex,
    google_key: Regex,
}

impl PiiRedactor {
    fn new() -> Self {
        Self {
            email: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .expect("valid email regex"),
            card: Regex::new(
                r"\b(?:\d{4}[ -]?\d{6}[ -]?\d{5}|\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,7})\b",
            )
            .expect("valid card number regex"),
            phone: Regex::new(r"(\+\d{1,2}\s?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}")
                .expect("valid phone number regex"),
            google_key: Regex::new(r"AIza[0-9A-Za-z_-]+").expect("valid Google API key regex"),
        }
    }

    fn redact(&self, raw: &str) -> String {
        let mut output = raw.to_string();
        // Every replacement removes digits or an `@`, so this terminates.
        loop {
            let email = apply_if_match(&self.email, EMAIL_PLACEHOLDER, &mut output);
            let card = apply_if_match(&self.card, CARD_PLACEHOLDER, &mut output);
            let phone = apply_if_match(&self.phone, PHONE_PLACEHOLDER, &mut output);
            if !(email || card || phone) {
                return output;
            }
        }
    }
}

/// Returns whether anything was replaced.
fn apply_if_match(re: &Regex, replacement: &str, output: &mut String) -> bool {
    if !re.is_match(output) {
        return false;
    }
    // `NoExpand`: placeholders are literal, never capture references.
    let replaced = re
        .replace_all(output.as_str(), regex::NoExpand(replacement))
        .into_owned();
    *output = replaced;
    true
}
