//! JSON-over-HTTP with retry and exponential backoff.
//!
//! Shared by the embedding and completion providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors and timeouts → retry
//! - Other 4xx → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HttpError {
    /// Unreachable, rejected, unauthenticated, or out of retries.
    #[error("{0}")]
    Unavailable(String),
    /// The body of a successful response was not JSON.
    #[error("invalid JSON response: {0}")]
    Decode(String),
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// POST `body` to `url` and decode the JSON reply, retrying transient
/// failures up to `max_retries` times.
///
/// `service` names the remote in error messages (e.g. `"OpenAI"`).
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<serde_json::Value, HttpError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            debug!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| HttpError::Decode(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();
                let message = format!("{} API error {}: {}", service, status, body_text);
                if is_retryable(status) {
                    warn!(service, %status, attempt, "transient API error");
                    last_err = Some(message);
                    continue;
                }
                return Err(HttpError::Unavailable(message));
            }
            Err(e) => {
                warn!(service, attempt, error = %e, "request failed");
                last_err = Some(format!("{} connection error ({}): {}", service, url, e));
                continue;
            }
        }
    }

    Err(HttpError::Unavailable(last_err.unwrap_or_else(|| {
        format!("{} request failed after retries", service)
    })))
}

/// Read an API key from the environment.
pub fn api_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
