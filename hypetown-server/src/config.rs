//! Server Configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Maximum taps credited per `/api/tap` request.
pub const MAX_TAPS_PER_BATCH: u32 = 50;

/// Maximum accepted length of a model URL.
pub const MAX_MODEL_URL_LEN: usize = 512;

/// Backend configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Telegram bot token used to verify `initData` signatures.
    pub bot_token: String,
    /// Reject `initData` older than this. `None` disables the check.
    pub init_data_max_age: Option<Duration>,
    /// Create unknown players on first request instead of returning 404.
    pub auto_register: bool,
    /// Taps credited per request at most.
    pub max_taps_per_batch: u32,
    /// Longest accepted model URL.
    pub max_model_url_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            bot_token: String::new(),
            init_data_max_age: Some(Duration::from_secs(24 * 60 * 60)),
            auto_register: false,
            max_taps_per_batch: MAX_TAPS_PER_BATCH,
            max_model_url_len: MAX_MODEL_URL_LEN,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("HYPETOWN_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            bot_token: std::env::var("BOT_TOKEN").unwrap_or_default(),
            init_data_max_age: match std::env::var("HYPETOWN_INIT_DATA_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.init_data_max_age,
            },
            auto_register: std::env::var("HYPETOWN_AUTO_REGISTER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            ..defaults
        }
    }

    /// Check if a bot token is configured.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty()
    }
}
