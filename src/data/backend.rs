use async_trait::async_trait;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::data::{get_records, http_client, with_retry, PriceQuery, PriceSource, RetryPolicy};
use crate::error::FetchError;
use crate::prices::normalize::normalize_raw;
use crate::prices::PriceRecord;

const SOURCE_NAME: &str = "backend";

/// The local backend's `/market-prices` proxy. It takes no parameters, so
/// every query returns the full set.
pub struct BackendSource {
    client: reqwest::Client,
    url: String,
    timeout_seconds: u64,
    retry: RetryPolicy,
}

impl BackendSource {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let base_url = config.source.backend_url.trim_end_matches('/');
        Ok(Self {
            client: http_client(config.source.timeout_seconds)?,
            url: format!("{base_url}/market-prices"),
            timeout_seconds: config.source.timeout_seconds,
            retry: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl PriceSource for BackendSource {
    #[instrument(skip(self, _query), fields(source = SOURCE_NAME))]
    async fn fetch(&self, _query: &PriceQuery) -> Result<Vec<PriceRecord>, FetchError> {
        let raw = with_retry(self.retry, SOURCE_NAME, || {
            get_records(self.client.get(&self.url), SOURCE_NAME, self.timeout_seconds)
        })
        .await?;

        if raw.is_empty() {
            return Err(FetchError::EmptyBody(SOURCE_NAME.to_string()));
        }

        let records = normalize_raw(&raw);
        info!(raw = raw.len(), usable = records.len(), "Backend prices fetched");
        Ok(records)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
