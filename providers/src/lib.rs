//! Remote BEC classifier clients.
//!
//! # Architecture
//!
//! - [`Classifier`] - The seam the orchestrator calls; tests substitute their own
//! - [`gemini`] - Google Gemini client (GenerateContent API)
//! - [`retry`] - Exponential backoff shared by every HTTP call
//!
//! # Error Handling
//!
//! Every failure is a [`ClassifierError`]. Transport errors are stripped of
//! their URL before they are stored or logged, since the Gemini key travels in
//! the query string.

pub mod gemini;
pub mod retry;

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use becwatch_types::{ApiKey, Verdict};
use thiserror::Error;

pub use becwatch_types;
pub use gemini::{GeminiClassifier, GeminiConfig};

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Model used when the config does not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Non-retryable HTTP status (4xx and friends); one attempt only.
    #[error("classifier rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    /// Every attempt failed with a server error or transport failure.
    #[error("classifier unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    #[error("classifier response contained no candidate text")]
    EmptyResponse,
    #[error("classifier returned a malformed verdict ({detail}): {raw}")]
    MalformedVerdict { detail: String, raw: String },
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

/// Remote scoring of one (already redacted) email.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        api_key: &ApiKey,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<Verdict, ClassifierError>> + Send;
}

/// Shared hardened client for production use.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build hardened HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::builder()
                .https_only(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_default()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(true)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("becwatch/", env!("CARGO_PKG_VERSION")))
}

/// Read at most 32 KiB of an error response body.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
