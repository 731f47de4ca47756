//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max attempts: 3 (initial request included)
//! - Delay before retry `n` (0-based): `base_delay * 2^n + jitter`, jitter uniform in `[0, max_jitter)`
//! - No sleep after the final attempt
//!
//! # Retryable Conditions
//!
//! - HTTP 5xx
//! - Transport errors (connect, timeout, reset)
//!
//! Any other non-success status is returned after a single attempt.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, initial request included. Zero is treated as one.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per retry.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the additive random jitter.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

/// Server errors are transient; everything else is the caller's fault.
#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Delay before the retry following attempt `backoff_step` (0-based).
#[must_use]
pub fn calculate_retry_delay(backoff_step: u32, config: &RetryConfig) -> Duration {
    let exp = 2.0_f64.powi(backoff_step.min(16) as i32);
    let base = config.base_delay.as_secs_f64() * exp;
    let jitter = rand::random::<f64>() * config.max_jitter.as_secs_f64();
    Duration::from_secs_f64(base + jitter)
}

/// Outcome of a retried request.
///
/// Success and failure are distinct variants so an error response can never be
/// consumed as a verdict.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response: either non-retryable, or the last of `attempts` server errors.
    HttpError { attempts: u32, response: Response },
    /// Transport failure on the final attempt.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// The request could not be built or sent at all; retrying would not help.
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let attempts = attempt + 1;
        let is_last = attempts >= max_attempts;

        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if !should_retry(status) || is_last {
                    return RetryOutcome::HttpError { attempts, response };
                }
                let delay = calculate_retry_delay(attempt, config);
                tracing::debug!(
                    status = %status,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying classifier request after server error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                let e = e.without_url();
                if !is_retryable_error(&e) {
                    return RetryOutcome::NonRetryable(e);
                }
                if is_last {
                    return RetryOutcome::ConnectionError {
                        attempts,
                        source: e,
                    };
                }
                let delay = calculate_retry_delay(attempt, config);
                tracing::debug!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying classifier request after transport error"
                );
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    !error.is_builder()
}
