//! Retry policy for Assistants API calls.
//!
//! - Up to 2 retries (3 attempts total)
//! - Exponential backoff from 500ms, capped at 8s
//! - Down-jitter of up to 25%
//! - `Retry-After-Ms` / `Retry-After` honoured when in `(0, 60s)`
//!
//! Retryable: HTTP 408, 409, 429, 5xx and connect/timeout failures. The server
//! can force or forbid a retry with `x-should-retry`. Every attempt of one
//! logical request carries the same `Idempotency-Key`.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use uuid::Uuid;

const RETRY_COUNT_HEADER: &str = "X-Stainless-Retry-Count";
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the backoff that may be shaved off at random.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// No retries. Used for polling, where the poll loop already repeats.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `step + 1`.
    #[must_use]
    pub fn backoff(&self, step: u32, headers: Option<&HeaderMap>) -> Duration {
        if let Some(delay) = headers.and_then(parse_retry_after) {
            return delay;
        }

        let exp = step.min(16) as i32;
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = 1.0 - rand::random::<f64>() * self.jitter_factor;
        Duration::from_secs_f64(capped * jitter)
    }
}

/// Reads `Retry-After-Ms` (float milliseconds) then `Retry-After` (integer
/// seconds). Values outside `(0, 60s)` are ignored.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let in_range = |d: Duration| d > Duration::ZERO && d < MAX_RETRY_AFTER;

    let millis = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| Duration::from_secs_f64(ms / 1000.0))
        .filter(|d| in_range(*d));
    if millis.is_some() {
        return millis;
    }

    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .filter(|d| in_range(*d))
}

#[must_use]
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    let forced = headers
        .get("x-should-retry")
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    match forced.as_deref() {
        Some("true") => true,
        Some("false") => false,
        _ => matches!(status.as_u16(), 408 | 409 | 429 | 500..=599),
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Final non-2xx response, kept for its body.
    HttpError(Response),
    Transport { attempts: u32, source: reqwest::Error },
}

/// Sends the request built by `build_request`, retrying per `policy`.
///
/// `build_request` runs once per attempt, so bodies that cannot be cloned
/// (multipart forms) are rebuilt each time.
pub async fn send_with_retry<F>(build_request: F, policy: &RetryPolicy) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = format!("folio-retry-{}", Uuid::new_v4());
    let mut attempt: u32 = 0;

    loop {
        let request = build_request()
            .header(RETRY_COUNT_HEADER, attempt.to_string())
            .header(IDEMPOTENCY_HEADER, idempotency_key.as_str());
        let exhausted = attempt >= policy.max_retries;

        let delay = match request.send().await {
            Ok(response) if response.status().is_success() => {
                return RetryOutcome::Success(response);
            }
            Ok(response) => {
                let status = response.status();
                if exhausted || !should_retry(status, response.headers()) {
                    return RetryOutcome::HttpError(response);
                }
                let delay = policy.backoff(attempt, Some(response.headers()));
                tracing::debug!(
                    %status,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying after error status"
                );
                delay
            }
            Err(source) => {
                if exhausted || !is_retryable_error(&source) {
                    return RetryOutcome::Transport {
                        attempts: attempt + 1,
                        source,
                    };
                }
                let delay = policy.backoff(attempt, None);
                tracing::debug!(
                    error = %source,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying after connection error"
                );
                delay
            }
        };

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
