pub mod backend;
pub mod gov_api;
pub mod sample;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{AppConfig, RateLimitConfig, Secrets, SourceKind};
use crate::error::FetchError;
use crate::prices::normalize::RawResponse;
use crate::prices::PriceRecord;

pub use backend::BackendSource;
pub use gov_api::GovApiSource;
pub use sample::SampleSource;

pub(crate) type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Upstream-side narrowing, forwarded to sources that support it.
/// Client-side filtering happens later in [`crate::prices::PriceFilter`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceQuery {
    pub state: Option<String>,
    pub commodity: Option<String>,
}

/// Anything that can produce a batch of normalized price records.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current record set. Malformed records are already dropped.
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, FetchError>;

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}

/// Pick the configured source.
pub fn build_source(
    config: &AppConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn PriceSource>, FetchError> {
    let source: Arc<dyn PriceSource> = match config.source.kind {
        SourceKind::GovApi => match &secrets.data_gov_api_key {
            Some(key) => Arc::new(GovApiSource::new(config, key.clone())?),
            None => {
                warn!("DATA_GOV_API_KEY not configured, serving sample prices");
                Arc::new(SampleSource)
            }
        },
        SourceKind::Backend => Arc::new(BackendSource::new(config)?),
        SourceKind::Sample => Arc::new(SampleSource),
    };

    info!(source = source.name(), "Price source selected");
    Ok(source)
}

/// Retry and backoff settings shared by the HTTP sources.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.source.max_retries,
            backoff_base_ms: config.rate_limit.backoff_base_ms,
            backoff_max_ms: config.rate_limit.backoff_max_ms,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(ms.min(self.backoff_max_ms))
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
pub(crate) async fn with_retry<F, Fut, T>(
    policy: RetryPolicy,
    source: &str,
    operation: F,
) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                if !e.is_retryable() || attempt > policy.max_retries {
                    return Err(e);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    source,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("mandi-tracker/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?;
    Ok(client)
}

pub(crate) fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Send a GET and decode either response shape into raw records.
pub(crate) async fn get_records(
    request: reqwest::RequestBuilder,
    source: &str,
    timeout_seconds: u64,
) -> Result<Vec<Value>, FetchError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout(timeout_seconds)
        } else {
            FetchError::Request(e)
        }
    })?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            source_name: source.to_string(),
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody(source.to_string()));
    }

    let raw: RawResponse = serde_json::from_str(&body)?;
    Ok(raw.into_records())
}

/// Pull a readable message out of an error body, e.g. `{"error": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|field| v.get(*field).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 3000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3000));
    }

    #[test]
    fn test_error_message_from_json_body() {
        assert_eq!(
            error_message(r#"{"error": "No data found for the selected filters."}"#),
            "No data found for the selected filters."
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_rate_limiter_creation() {
        let config = RateLimitConfig {
            requests_per_second: 2,
            burst_size: 4,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
        };
        let limiter = create_rate_limiter(&config);
        assert!(limiter.check().is_ok());
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
        };
        let result: Result<(), FetchError> = with_retry(policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FetchError::Status {
                    source_name: "test".to_string(),
                    status: 403,
                    message: "forbidden".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 1,
        };
        let result = with_retry(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Timeout(10))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        tokio_test::assert_ok!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
