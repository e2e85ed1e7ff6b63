//! # HYPETOWN Mini App Backend
//!
//! Reference implementation of the HTTP API the HYPETOWN client syncs with.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HYPETOWN SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  api.rs          - axum router, handlers, error codes        │
//! │  auth.rs         - Telegram initData HMAC validation         │
//! │  economy.rs      - Tap power, upgrade table, transactions    │
//! │  store.rs        - In-memory player table                    │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The server is authoritative for coins: clients send tap counts, never
//! balances, and adopt `total_coins` from every tap response.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod economy;
pub mod store;

// Re-export commonly used types
pub use api::{build_router, start_api_server, ApiError, ApiState};
pub use auth::{sign_init_data, validate_init_data, AuthError, InitData, TelegramUser};
pub use config::ServerConfig;
pub use store::{PlayerRecord, PlayerStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
