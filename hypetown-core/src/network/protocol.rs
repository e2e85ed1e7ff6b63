//! Protocol messages for client-server communication
//!
//! JSON bodies of the Mini-App HTTP API. Shared by the client and the
//! reference backend so both sides agree on field names.

use serde::{Deserialize, Serialize};

use crate::game::state::PlayerSnapshot;

/// `GET` full player state.
pub const STATE_PATH: &str = "/api/state";
/// `POST` a batch of taps.
pub const TAP_PATH: &str = "/api/tap";
/// `POST` a new character model URL.
pub const MODEL_PATH: &str = "/api/model";
/// `POST` a wallet address.
pub const WALLET_CONNECT_PATH: &str = "/api/wallet/connect";

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Body of `POST /api/tap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapRequest {
    /// Number of taps in this batch.
    #[serde(default = "one_tap")]
    pub taps: u32,
}

fn one_tap() -> u32 {
    1
}

/// Body of `POST /api/model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// URL of the GLB model.
    #[serde(default)]
    pub model_url: String,
}

/// Body of `POST /api/wallet/connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRequest {
    /// Wallet address.
    #[serde(default)]
    pub address: String,
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Response of `GET /api/state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    /// Player profile.
    pub player: PlayerSnapshot,
    /// Clicker upgrade levels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrades: Vec<UpgradeLevel>,
}

/// One owned clicker upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevel {
    /// Upgrade key, e.g. `"smartphone"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Purchased level.
    pub level: u32,
}

/// Response of `POST /api/tap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapResponse {
    /// Coins granted for this batch.
    pub earned: u64,
    /// Authoritative coin balance after the batch.
    pub total_coins: u64,
    /// Current tap power, if the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_power: Option<u32>,
}

/// Response of `POST /api/model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Whether the update was applied.
    pub ok: bool,
    /// Stored URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

/// Response of `POST /api/wallet/connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletResponse {
    /// Whether the wallet was linked.
    pub ok: bool,
    /// Stored address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

/// Error body returned with any non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code, e.g. `"unauthorized"`.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_request_shape() {
        let json = serde_json::to_string(&TapRequest { taps: 12 }).unwrap();
        assert_eq!(json, r#"{"taps":12}"#);

        let missing: TapRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.taps, 1);
    }

    #[test]
    fn test_tap_response_without_tap_power() {
        let resp: TapResponse = serde_json::from_str(r#"{"earned": 10, "total_coins": 510}"#).unwrap();
        assert_eq!(resp.total_coins, 510);
        assert_eq!(resp.tap_power, None);
    }

    #[test]
    fn test_state_response_with_extras() {
        let json = r#"{
            "player": {"name": "Ada", "coins": 77, "archetype": "streamer"},
            "buildings": [{"id": 1, "type": "cinema_studio"}],
            "upgrades": [{"type": "smartphone", "level": 3}]
        }"#;
        let resp: StateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.player.coins, Some(77));
        assert_eq!(resp.upgrades, vec![UpgradeLevel { kind: "smartphone".into(), level: 3 }]);
    }

    #[test]
    fn test_request_bodies() {
        let model = serde_json::to_value(ModelRequest { model_url: "https://cdn/x.glb".into() }).unwrap();
        assert_eq!(model["model_url"], "https://cdn/x.glb");

        let wallet = serde_json::to_value(WalletRequest { address: "UQabc".into() }).unwrap();
        assert_eq!(wallet["address"], "UQabc");
    }
}
