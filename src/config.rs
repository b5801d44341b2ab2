use std::path::Path;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

use crate::prices::table::DuplicatePolicy;
use crate::prices::CompareOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub comparison: ComparisonConfig,
    pub monitoring: MonitoringConfig,
    pub dashboard: DashboardConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// data.gov.in directly. Falls back to `Sample` without an API key.
    GovApi,
    /// The local backend's `/market-prices` proxy.
    Backend,
    Sample,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub gov_api_base_url: String,
    pub resource_id: String,
    pub backend_url: String,
    /// Records requested per data.gov.in page.
    pub page_limit: u32,
    pub max_pages: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    pub top_n: usize,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl ComparisonConfig {
    pub fn options(&self) -> CompareOptions {
        CompareOptions {
            top_n: self.top_n,
            duplicate_policy: self.duplicate_policy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub bind: String,
    pub port: u16,
    /// Background refresh period while serving. Zero disables it.
    pub refresh_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub data_gov_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            data_gov_api_key: std::env::var("DATA_GOV_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::from),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, with secrets from the environment
    /// (and `.env` if present).
    pub fn load(path: Option<&Path>) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        anyhow::ensure!(config.comparison.top_n > 0, "comparison.top_n must be positive");
        anyhow::ensure!(config.source.page_limit > 0, "source.page_limit must be positive");
        anyhow::ensure!(
            config
                .source
                .page_limit
                .checked_mul(config.source.max_pages)
                .is_some(),
            "source.page_limit * source.max_pages must fit in a u32 offset"
        );
        Ok(config)
    }
}
