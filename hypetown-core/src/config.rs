//! Client Configuration

use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::{DEFAULT_MAX_BATCH, DEFAULT_SYNC_INTERVAL_MS};

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL is not an http(s) URL.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    /// Sync interval must be positive.
    #[error("sync interval must be greater than zero")]
    ZeroInterval,
    /// Batch cap must be positive.
    #[error("max batch size must be greater than zero")]
    ZeroBatch,
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.hypetown.app`.
    pub api_base_url: String,
    /// Opaque session token sent as `Authorization` (Telegram `initData`).
    pub init_data: String,
    /// Interval between tap flushes.
    pub sync_interval: Duration,
    /// Maximum taps per flush request.
    pub max_batch_size: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How long shutdown waits for the final flush.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            init_data: String::new(),
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            max_batch_size: DEFAULT_MAX_BATCH,
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables. Unset or unparsable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        let config = Self {
            api_base_url: std::env::var("HYPETOWN_API_URL").unwrap_or(defaults.api_base_url),
            init_data: std::env::var("HYPETOWN_INIT_DATA").unwrap_or_default(),
            sync_interval: millis("HYPETOWN_SYNC_INTERVAL_MS", defaults.sync_interval),
            max_batch_size: std::env::var("HYPETOWN_MAX_BATCH")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_batch_size),
            request_timeout: millis("HYPETOWN_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            shutdown_timeout: millis("HYPETOWN_SHUTDOWN_TIMEOUT_MS", defaults.shutdown_timeout),
        };

        if config.init_data.is_empty() {
            warn!("HYPETOWN_INIT_DATA is empty - not running inside a Telegram Mini App?");
        }
        config
    }

    /// Check values that would make the sync loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        let has_host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(ConfigError::InvalidBaseUrl(self.api_base_url.clone()));
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_interval, Duration::from_secs(2));
        assert_eq!(config.max_batch_size, 50);
    }

    #[test]
    fn test_validation_errors() {
        let bad_url = ClientConfig {
            api_base_url: "ftp://files".into(),
            ..Default::default()
        };
        assert!(matches!(bad_url.validate(), Err(ConfigError::InvalidBaseUrl(_))));

        let empty_host = ClientConfig {
            api_base_url: "https://".into(),
            ..Default::default()
        };
        assert!(empty_host.validate().is_err());

        let zero_interval = ClientConfig {
            sync_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(zero_interval.validate(), Err(ConfigError::ZeroInterval));

        let zero_batch = ClientConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert_eq!(zero_batch.validate(), Err(ConfigError::ZeroBatch));
    }
}
