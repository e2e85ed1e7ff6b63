//! HYPETOWN Server
//!
//! Serves the Mini App API backed by an in-memory player store.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hypetown_server::{start_api_server, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = ServerConfig::from_env();

    info!("HYPETOWN Server v{}", VERSION);
    info!("Bind: {}", config.bind_addr);
    match config.init_data_max_age {
        Some(age) => info!("initData max age: {}s", age.as_secs()),
        None => info!("initData max age: unlimited"),
    }
    info!("Auto-register: {}", config.auto_register);

    if !config.is_configured() {
        warn!("BOT_TOKEN not set, every /api request will be rejected");
    }

    start_api_server(config).await
}
