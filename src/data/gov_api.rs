//! data.gov.in mandi price source.
//!
//! Reads the "current daily price of various commodities from various
//! markets" dataset, newest arrivals first, one page at a time.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::data::{
    create_rate_limiter, get_records, http_client, with_retry, Limiter, PriceQuery, PriceSource,
    RetryPolicy,
};
use crate::error::FetchError;
use crate::prices::normalize::normalize_raw;
use crate::prices::PriceRecord;

const SOURCE_NAME: &str = "data.gov.in";

pub struct GovApiSource {
    client: reqwest::Client,
    resource_url: String,
    api_key: SecretString,
    page_limit: u32,
    max_pages: u32,
    timeout_seconds: u64,
    retry: RetryPolicy,
    limiter: Arc<Limiter>,
}

impl GovApiSource {
    pub fn new(config: &AppConfig, api_key: SecretString) -> Result<Self, FetchError> {
        let source = &config.source;
        let base_url = source.gov_api_base_url.trim_end_matches('/');

        Ok(Self {
            client: http_client(source.timeout_seconds)?,
            resource_url: format!("{base_url}/resource/{}", source.resource_id),
            api_key,
            page_limit: source.page_limit,
            max_pages: source.max_pages.max(1),
            timeout_seconds: source.timeout_seconds,
            retry: RetryPolicy::from_config(config),
            limiter: create_rate_limiter(&config.rate_limit),
        })
    }

    fn page_params(&self, query: &PriceQuery, offset: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api-key", self.api_key.expose_secret().to_string()),
            ("format", "json".to_string()),
            ("limit", self.page_limit.to_string()),
            ("offset", offset.to_string()),
            ("sort[arrival_date]", "desc".to_string()),
        ];
        if let Some(state) = query.state.as_deref().filter(|s| !s.is_empty()) {
            params.push(("filters[state]", state.to_string()));
        }
        if let Some(commodity) = query.commodity.as_deref().filter(|s| !s.is_empty()) {
            params.push(("filters[commodity]", commodity.to_string()));
        }
        params
    }
}

#[async_trait]
impl PriceSource for GovApiSource {
    #[instrument(skip(self), fields(source = SOURCE_NAME))]
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, FetchError> {
        let mut raw = Vec::new();

        for page in 0..self.max_pages {
            self.limiter.until_ready().await;

            let offset = page.saturating_mul(self.page_limit);
            let params = self.page_params(query, offset);

            let records = with_retry(self.retry, SOURCE_NAME, || {
                let request = self.client.get(&self.resource_url).query(&params);
                get_records(request, SOURCE_NAME, self.timeout_seconds)
            })
            .await?;

            let page_count = records.len();
            debug!(page, offset, records = page_count, "Fetched price page");
            raw.extend(records);

            if (page_count as u32) < self.page_limit {
                break;
            }
        }

        if raw.is_empty() {
            return Err(FetchError::EmptyBody(SOURCE_NAME.to_string()));
        }

        let records = normalize_raw(&raw);
        info!(raw = raw.len(), usable = records.len(), "Mandi prices fetched");
        Ok(records)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
