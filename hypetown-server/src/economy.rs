//! Clicker Economy
//!
//! Upgrade table, tap power formula and the tap/upgrade transactions.
//!
//! ```text
//! tap_power = max(1, floor((1 + Σ tap_bonus·level) · Π multiplier^level · archetype_bonus))
//! cost      = floor(base_cost · cost_mult^level)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use hypetown::network::protocol::{TapResponse, UpgradeLevel};
use hypetown::{Archetype, PlayerState};

/// Clicker upgrade.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    Smartphone,
    Camera,
    Laptop,
    Studio,
    Production,
    MediaCorp,
    ViralAlgo,
    GoldButton,
}

/// What an upgrade level grants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradeEffect {
    /// Flat coins added per tap, per level.
    TapBonus(u32),
    /// Multiplier applied once per level.
    Multiplier(f64),
}

/// Static upgrade parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpgradeInfo {
    pub effect: UpgradeEffect,
    pub base_cost: u64,
    pub cost_mult: f64,
    pub max_level: u32,
}

impl UpgradeKind {
    /// All upgrades in shop order.
    pub const ALL: [UpgradeKind; 8] = [
        UpgradeKind::Smartphone,
        UpgradeKind::Camera,
        UpgradeKind::Laptop,
        UpgradeKind::Studio,
        UpgradeKind::Production,
        UpgradeKind::MediaCorp,
        UpgradeKind::ViralAlgo,
        UpgradeKind::GoldButton,
    ];

    /// Wire key.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeKind::Smartphone => "smartphone",
            UpgradeKind::Camera => "camera",
            UpgradeKind::Laptop => "laptop",
            UpgradeKind::Studio => "studio",
            UpgradeKind::Production => "production",
            UpgradeKind::MediaCorp => "media_corp",
            UpgradeKind::ViralAlgo => "viral_algo",
            UpgradeKind::GoldButton => "gold_button",
        }
    }

    /// Parse a wire key.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    /// Table row for this upgrade.
    pub fn info(&self) -> UpgradeInfo {
        use UpgradeEffect::*;
        let (effect, base_cost, cost_mult, max_level) = match self {
            UpgradeKind::Smartphone => (TapBonus(1), 50, 1.5, 50),
            UpgradeKind::Camera => (TapBonus(3), 200, 1.6, 40),
            UpgradeKind::Laptop => (TapBonus(10), 1_000, 1.7, 30),
            UpgradeKind::Studio => (TapBonus(30), 5_000, 1.8, 25),
            UpgradeKind::Production => (TapBonus(100), 25_000, 1.9, 20),
            UpgradeKind::MediaCorp => (TapBonus(500), 200_000, 2.0, 15),
            UpgradeKind::ViralAlgo => (Multiplier(2.0), 100_000, 3.0, 5),
            UpgradeKind::GoldButton => (Multiplier(1.5), 500_000, 4.0, 3),
        };
        UpgradeInfo { effect, base_cost, cost_mult, max_level }
    }
}

/// Multiplicative clicker bonus of an archetype.
pub fn archetype_clicker_bonus(archetype: Archetype) -> f64 {
    match archetype {
        Archetype::Blogger => 1.2,
        _ => 1.0,
    }
}

/// Price of buying the level after `current_level`.
pub fn upgrade_cost(kind: UpgradeKind, current_level: u32) -> u64 {
    let info = kind.info();
    (info.base_cost as f64 * info.cost_mult.powi(current_level as i32)) as u64
}

/// Tap power for a set of owned upgrades.
pub fn calc_tap_power(upgrades: &BTreeMap<UpgradeKind, u32>, archetype: Archetype) -> u32 {
    let mut additive: u64 = 0;
    let mut multiplier = archetype_clicker_bonus(archetype);

    for (kind, &level) in upgrades {
        match kind.info().effect {
            UpgradeEffect::TapBonus(bonus) => additive += bonus as u64 * level as u64,
            UpgradeEffect::Multiplier(m) => multiplier *= m.powi(level as i32),
        }
    }

    let power = ((1 + additive) as f64 * multiplier) as u64;
    power.clamp(1, u32::MAX as u64) as u32
}

/// Upgrade levels in wire form, in shop order.
pub fn upgrade_levels(upgrades: &BTreeMap<UpgradeKind, u32>) -> Vec<UpgradeLevel> {
    upgrades
        .iter()
        .filter(|(_, &level)| level > 0)
        .map(|(kind, &level)| UpgradeLevel { kind: kind.as_str().to_string(), level })
        .collect()
}

/// Credit a batch of taps. `taps` is capped at `max_taps`.
pub fn process_tap(player: &mut PlayerState, taps: u32, max_taps: u32) -> TapResponse {
    let taps = taps.min(max_taps);
    let earned = player.tap_power as u64 * taps as u64;
    player.coins = player.coins.saturating_add(earned);

    TapResponse {
        earned,
        total_coins: player.coins,
        tap_power: Some(player.tap_power),
    }
}

/// Purchase rejection.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PurchaseError {
    #[error("upgrade already at max level")]
    MaxLevel,
    #[error("not enough coins, need {cost}")]
    NotEnoughCoins { cost: u64 },
}

/// Response of `POST /api/upgrade`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub ok: bool,
    pub new_level: u32,
    pub new_tap_power: u32,
    pub cost: u64,
}

/// Buy one level of `kind`.
pub fn buy_upgrade(
    player: &mut PlayerState,
    upgrades: &mut BTreeMap<UpgradeKind, u32>,
    kind: UpgradeKind,
) -> Result<Purchase, PurchaseError> {
    let current_level = upgrades.get(&kind).copied().unwrap_or(0);
    if current_level >= kind.info().max_level {
        return Err(PurchaseError::MaxLevel);
    }

    let cost = upgrade_cost(kind, current_level);
    if player.coins < cost {
        return Err(PurchaseError::NotEnoughCoins { cost });
    }

    player.coins -= cost;
    upgrades.insert(kind, current_level + 1);
    player.tap_power = calc_tap_power(upgrades, player.archetype);

    Ok(Purchase {
        ok: true,
        new_level: current_level + 1,
        new_tap_power: player.tap_power,
        cost,
    })
}

// =============================================================================
// TESTS
// =============================================================================
