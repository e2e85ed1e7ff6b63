//! Network Layer
//!
//! HTTP+JSON synchronization with the Mini-App backend.

pub mod client;
pub mod protocol;

pub use client::{ApiClient, GameApi, SyncError};
pub use protocol::{
    ErrorResponse, ModelRequest, ModelResponse, StateResponse, TapRequest, TapResponse,
    UpgradeLevel, WalletRequest, WalletResponse,
};
