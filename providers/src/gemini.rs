//! Google Gemini classifier (GenerateContent API).

use std::time::Duration;

use becwatch_types::{ApiKey, Verdict, text::truncate_chars};
use becwatch_utils::redact_api_keys;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry, should_retry};
use crate::{
    Classifier, ClassifierError, DEFAULT_GEMINI_MODEL, GEMINI_API_BASE_URL, http_client,
    read_capped_error_body,
};

/// Instruction prepended to every classification prompt.
pub const SYSTEM_PROMPT: &str = r#"You are a BEC expert. Return ONLY a raw JSON object like {"score":5, "reason":"Brief explanation."}. Score is 0 (genuine) to 10 (definite BEC)."#;

/// Body characters sent to the model.
pub const MAX_BODY_CHARS: usize = 5000;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_API_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClassifier {
    /// Classifier on the shared hardened (HTTPS-only) client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(http_client().clone(), config)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, api_key: &ApiKey) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!(
            "{base}/models/{}:generateContent?key={}",
            self.config.model,
            api_key.expose_secret()
        )
    }
}

impl Classifier for GeminiClassifier {
    async fn classify(
        &self,
        api_key: &ApiKey,
        subject: &str,
        body: &str,
    ) -> Result<Verdict, ClassifierError> {
        let url = self.endpoint(api_key);
        let request_body = build_request_body(&build_prompt(subject, body));
        let timeout = self.config.request_timeout;

        let outcome = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .timeout(timeout)
                    .header("content-type", "application/json")
                    .json(&request_body)
            },
            &self.config.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError { attempts, response } => {
                let status = response.status();
                let body = redact_api_keys(&read_capped_error_body(response).await);
                tracing::warn!(%status, attempts, "Classifier request failed");
                return Err(if should_retry(status) {
                    ClassifierError::Exhausted {
                        attempts,
                        last: format!("HTTP {status}: {body}"),
                    }
                } else {
                    ClassifierError::Rejected {
                        status: status.as_u16(),
                        body,
                    }
                });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                tracing::warn!(error = %source, attempts, "Classifier unreachable");
                return Err(ClassifierError::Exhausted {
                    attempts,
                    last: source.to_string(),
                });
            }
            RetryOutcome::NonRetryable(e) => return Err(ClassifierError::Client(e)),
        };

        let raw = response
            .text()
            .await
            .map_err(|e| ClassifierError::Client(e.without_url()))?;
        let text = extract_candidate_text(&raw)?;
        let verdict = parse_verdict(&text)?;
        tracing::info!(
            score = verdict.score,
            model = %self.config.model,
            "Received classifier verdict"
        );
        Ok(verdict)
    }
}

/// Prompt text: instruction, blank line, subject, and the body's first 5000 characters.
#[must_use]
pub fn build_prompt(subject: &str, body: &str) -> String {
    let body = truncate_chars(body, MAX_BODY_CHARS);
    format!("{SYSTEM_PROMPT}\n\nSubject: {subject}\nBody: {body}")
}

fn build_request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// `candidates[0].content.parts[0].text` of a GenerateContent response.
fn extract_candidate_text(raw: &str) -> Result<String, ClassifierError> {
    let response: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|e| ClassifierError::MalformedVerdict {
            detail: format!("response is not GenerateContent JSON: {e}"),
            raw: raw.to_string(),
        })?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ClassifierError::EmptyResponse)
}

/// Parse a `{"score": n, "reason": "..."}` object out of free-form model text.
///
/// Models often wrap the object in prose or code fences; the first balanced
/// object is used.
pub fn parse_verdict(text: &str) -> Result<Verdict, ClassifierError> {
    let malformed = |detail: &str| ClassifierError::MalformedVerdict {
        detail: detail.to_string(),
        raw: text.to_string(),
    };

    let object = extract_json_object(text).ok_or_else(|| malformed("no JSON object found"))?;
    let value: Value = serde_json::from_str(object)
        .map_err(|e| malformed(&format!("invalid JSON object: {e}")))?;

    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("missing numeric `score`"))?;
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing string `reason`"))?;

    Ok(Verdict::from_raw_score(score, reason))
}

/// First balanced `{...}` span in `text`, ignoring braces inside string literals.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        ClassifierError, MAX_BODY_CHARS, SYSTEM_PROMPT, build_prompt, build_request_body,
        extract_candidate_text, extract_json_object, parse_verdict,
    };

    #[test]
    fn prompt_joins_instruction_subject_and_body() {
        let prompt = build_prompt("Invoice", "Hi Bob");
        assert_eq!(prompt, format!("{SYSTEM_PROMPT}\n\nSubject: Invoice\nBody: Hi Bob"));
    }

    #[test]
    fn prompt_truncates_body() {
        let body = "b".repeat(MAX_BODY_CHARS + 500);
        let prompt = build_prompt("s", &body);
        assert!(prompt.ends_with(&format!("Body: {}", "b".repeat(MAX_BODY_CHARS))));
    }

    #[test]
    fn request_body_shape() {
        let body = build_request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn extracts_object_from_fenced_text() {
        let text = "```json\n{\"score\": 8, \"reason\": \"Wire request\"}\n```";
        assert_eq!(
            extract_json_object(text),
            Some("{\"score\": 8, \"reason\": \"Wire request\"}")
        );
    }

    #[test]
    fn extraction_ignores_braces_in_strings() {
        let text = r#"Sure: {"score": 3, "reason": "uses } and { oddly \" quoted"} trailing}"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"score": 3, "reason": "uses } and { oddly \" quoted"}"#)
        );
    }

    #[test]
    fn extraction_handles_nesting() {
        let text = r#"{"score": 2, "meta": {"a": 1}, "reason": "ok"} {"score": 9}"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"score": 2, "meta": {"a": 1}, "reason": "ok"}"#)
        );
    }

    #[test]
    fn unbalanced_object_is_none() {
        assert_eq!(extract_json_object("{\"score\": 5"), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn parses_valid_verdict() {
        let verdict = parse_verdict("{\"score\":5, \"reason\":\"Brief explanation.\"}").unwrap();
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.reason, "Brief explanation.");
    }

    #[test]
    fn fractional_and_out_of_range_scores_are_clamped() {
        assert_eq!(parse_verdict(r#"{"score": 7.6, "reason": "r"}"#).unwrap().score, 8);
        assert_eq!(parse_verdict(r#"{"score": 14, "reason": "r"}"#).unwrap().score, 10);
        assert_eq!(parse_verdict(r#"{"score": -2, "reason": "r"}"#).unwrap().score, 0);
    }

    #[test]
    fn string_score_is_malformed() {
        let err = parse_verdict(r#"{"score": "high", "reason": "r"}"#).unwrap_err();
        match err {
            ClassifierError::MalformedVerdict { detail, raw } => {
                assert!(detail.contains("score"));
                assert!(raw.contains("high"));
            }
            other => panic!("expected MalformedVerdict, got {other:?}"),
        }
    }

    #[test]
    fn missing_reason_is_malformed() {
        assert!(matches!(
            parse_verdict(r#"{"score": 4}"#),
            Err(ClassifierError::MalformedVerdict { .. })
        ));
    }

    #[test]
    fn prose_without_object_is_malformed() {
        assert!(matches!(
            parse_verdict("I think this is a scam, score 9."),
            Err(ClassifierError::MalformedVerdict { .. })
        ));
    }

    #[test]
    fn candidate_text_is_first_part() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}}]}"#;
        assert_eq!(extract_candidate_text(raw).unwrap(), "first");
    }

    #[test]
    fn no_candidates_is_empty_response() {
        assert!(matches!(
            extract_candidate_text(r#"{"candidates":[]}"#),
            Err(ClassifierError::EmptyResponse)
        ));
        assert!(matches!(
            extract_candidate_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(ClassifierError::EmptyResponse)
        ));
    }
}
