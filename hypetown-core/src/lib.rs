//! # HYPETOWN Mini-App Core
//!
//! Tap batching and client/server state reconciliation for the HYPETOWN
//! tap-to-earn clicker. Engine-agnostic: the host engine feeds taps in and
//! receives presentation requests back through [`game::tap::TapPresenter`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HYPETOWN CORE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Local game state (sans-IO)                │
//! │  ├── state.rs    - PlayerState, Archetype, snapshot merge    │
//! │  ├── tap.rs      - Pending tap counter and batcher           │
//! │  └── model.rs    - Character model fetch + archetype fallback│
//! │                                                              │
//! │  network/        - HTTP+JSON sync with the backend           │
//! │  ├── protocol.rs - Wire types shared with the server         │
//! │  └── client.rs   - reqwest ApiClient, GameApi trait          │
//! │                                                              │
//! │  session.rs      - Session controller and tokio driver       │
//! │  config.rs       - Client configuration                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconciliation
//!
//! Taps are credited locally right away and counted as pending. Every sync
//! interval at most one capped batch is sent; on success the local coin
//! balance is replaced by the server's authoritative total, on failure the
//! batch stays pending and is retried on the next interval.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod game;
pub mod network;
pub mod session;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError};
pub use game::model::{CharacterModel, ModelError, ModelFetcher};
pub use game::state::{Archetype, PlayerSnapshot, PlayerState};
pub use game::tap::{FlushOutcome, FlushTicket, PendingTapCounter, TapBatcher, TapPresenter, TapReaction, WorldPoint};
pub use network::client::{ApiClient, GameApi, SyncError};
pub use session::{GameSession, SessionDriver, SessionSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default interval between tap batch flushes (milliseconds).
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 2000;

/// Default maximum number of taps sent in one batch.
pub const DEFAULT_MAX_BATCH: u32 = 50;
