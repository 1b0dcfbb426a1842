use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};

/// Longest `Retry-After` we are willing to honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Bounded retry with exponential backoff: attempt `n` (0-based) waits
/// `initial_backoff * 2^n` before the next try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// GET client that spaces requests by `min_interval` and retries every kind
/// of failure (transport errors, 429, any non-success status) under a
/// [`RetryPolicy`].
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    retry: RetryPolicy,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        retry: RetryPolicy,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            retry,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = self.client.get(url).headers(headers.clone()).send().await;

            let (error, wait) = match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .map(|d| d.min(MAX_RETRY_AFTER));
                    let wait = retry_after.map_or(self.retry.backoff(attempt), |d| {
                        d.max(self.retry.backoff(attempt))
                    });
                    (
                        ScienceError::RateLimit(url.to_string(), wait.as_secs()),
                        wait,
                    )
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    let snippet: String = body.chars().take(200).collect();
                    (
                        ScienceError::ApiError(url.to_string(), format!("HTTP {status}: {snippet}")),
                        self.retry.backoff(attempt),
                    )
                }
                Ok(r) => return r.text().await.map_err(ScienceError::Http),
                Err(e) => (ScienceError::Http(e), self.retry.backoff(attempt)),
            };

            if attempt >= self.retry.max_retries {
                debug!(url, attempts = attempt + 1, "giving up");
                return Err(error);
            }
            warn!(url, attempt = attempt + 1, wait_ms = wait.as_millis() as u64, error = %error, "request failed, retrying");
            sleep(wait).await;
            attempt += 1;
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: HeaderMap) -> Result<T> {
        let text = self.get_with_headers(url, headers).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }
}
