use serde::{Deserialize, Serialize};

use crate::utils::constants::{
    DEFAULT_BACKEND_URL, DEFAULT_GEOCODER_URL, DEFAULT_RETRY_BASE_SECONDS,
    DEFAULT_RETRY_INTERVAL_SECONDS, DEFAULT_RETRY_MAX_SECONDS, QUEUE_STORAGE_KEY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend_url: String,
    pub backend_api_key: Option<String>,
    pub geocoder_url: String,
    pub environment: String,
    pub enable_logging: bool,
    pub network_timeout_seconds: u32,
    pub retry: RetryConfig,
    pub queue_storage_key: String,
}

/// Backoff used by the periodic retry of the offline queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_seconds: i64,
    pub max_seconds: i64,
    pub interval_seconds: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_seconds: DEFAULT_RETRY_BASE_SECONDS,
            max_seconds: DEFAULT_RETRY_MAX_SECONDS,
            interval_seconds: DEFAULT_RETRY_INTERVAL_SECONDS,
        }
    }
}

impl RetryConfig {
    /// Seconds to wait after the `retry_count`-th failed attempt: 30, 60, 120, 240, then capped.
    pub fn backoff_seconds(&self, retry_count: u32) -> i64 {
        if retry_count == 0 {
            return 0;
        }
        let exp = retry_count.saturating_sub(1).min(30);
        self.base_seconds
            .saturating_mul(2_i64.saturating_pow(exp))
            .min(self.max_seconds)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_api_key: None,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            environment: "development".to_string(),
            enable_logging: true,
            network_timeout_seconds: 30,
            retry: RetryConfig::default(),
            queue_storage_key: QUEUE_STORAGE_KEY.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from compile-time environment (see build.rs), falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_url: option_env!("BACKEND_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            backend_api_key: option_env!("BACKEND_API_KEY")
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            geocoder_url: option_env!("GEOCODER_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.geocoder_url),
            environment: option_env!("ENVIRONMENT")
                .unwrap_or("development")
                .to_string(),
            enable_logging: parse_or(option_env!("ENABLE_LOGGING"), defaults.enable_logging),
            network_timeout_seconds: parse_or(
                option_env!("NETWORK_TIMEOUT_SECONDS"),
                defaults.network_timeout_seconds,
            ),
            retry: RetryConfig {
                base_seconds: parse_or(option_env!("RETRY_BASE_SECONDS"), defaults.retry.base_seconds),
                max_seconds: parse_or(option_env!("RETRY_MAX_SECONDS"), defaults.retry.max_seconds),
                interval_seconds: parse_or(
                    option_env!("RETRY_INTERVAL_SECONDS"),
                    defaults.retry.interval_seconds,
                ),
            },
            queue_storage_key: option_env!("QUEUE_STORAGE_KEY")
                .unwrap_or(QUEUE_STORAGE_KEY)
                .to_string(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.enable_logging
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, fallback: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

lazy_static::lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}
