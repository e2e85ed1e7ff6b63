//! Player State
//!
//! The client's copy of the player profile. The backend is authoritative;
//! local values may run ahead of it between tap flushes.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Player archetype. Selects the default character representation and
/// archetype-specific bonuses on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Archetype {
    /// Film director.
    #[default]
    Director,
    /// Game streamer.
    Streamer,
    /// Music producer.
    Producer,
    /// Sports magnate.
    Magnate,
    /// Blogger (clicker bonus).
    Blogger,
    /// Journalist.
    Journalist,
}

impl Archetype {
    /// All archetypes in display order.
    pub const ALL: [Archetype; 6] = [
        Archetype::Director,
        Archetype::Streamer,
        Archetype::Producer,
        Archetype::Magnate,
        Archetype::Blogger,
        Archetype::Journalist,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Director => "director",
            Archetype::Streamer => "streamer",
            Archetype::Producer => "producer",
            Archetype::Magnate => "magnate",
            Archetype::Blogger => "blogger",
            Archetype::Journalist => "journalist",
        }
    }

    /// Parse a wire name. Unknown names fall back to [`Archetype::Director`].
    pub fn parse_lenient(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }

    /// Badge shown next to the archetype name.
    pub fn emoji(&self) -> &'static str {
        match self {
            Archetype::Director => "🎬",
            Archetype::Streamer => "🎮",
            Archetype::Producer => "🎵",
            Archetype::Magnate => "🏟",
            Archetype::Blogger => "📱",
            Archetype::Journalist => "📰",
        }
    }

    /// Asset key of the bundled default model for this archetype.
    pub fn default_model_asset(&self) -> String {
        format!("models/{}.glb", self.as_str())
    }
}

impl From<String> for Archetype {
    fn from(name: String) -> Self {
        Self::parse_lenient(&name)
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full player state held by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Backend player id.
    pub id: i64,
    /// Telegram user id.
    pub tg_id: i64,
    /// Display name.
    pub name: String,
    /// Avatar (emoji or short string).
    pub avatar: String,
    /// Player archetype.
    pub archetype: Archetype,
    /// Current level.
    pub level: u32,
    /// Experience points.
    pub xp: u64,
    /// Soft currency balance.
    pub coins: u64,
    /// Premium currency balance.
    pub stars: u64,
    /// Coins granted per tap.
    pub tap_power: u32,
    /// Passive income per hour.
    pub passive_income: u64,
    /// Competitive rating.
    pub pvp_rating: i32,
    /// URL of a custom 3D character model.
    pub model_url: Option<String>,
    /// Connected TON wallet address.
    pub ton_wallet: Option<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            id: 0,
            tg_id: 0,
            name: String::new(),
            avatar: String::new(),
            archetype: Archetype::default(),
            level: 1,
            xp: 0,
            coins: 0,
            stars: 0,
            tap_power: 1,
            passive_income: 0,
            pvp_rating: 0,
            model_url: None,
            ton_wallet: None,
        }
    }
}

impl PlayerState {
    /// Overwrite the fields present in `snapshot`. Returns how many fields
    /// were applied.
    pub fn apply_snapshot(&mut self, snapshot: &PlayerSnapshot) -> usize {
        let mut applied = 0;

        macro_rules! merge {
            ($field:ident) => {
                if let Some(value) = &snapshot.$field {
                    self.$field = value.clone();
                    applied += 1;
                }
            };
        }

        merge!(id);
        merge!(tg_id);
        merge!(name);
        merge!(avatar);
        merge!(archetype);
        merge!(level);
        merge!(xp);
        merge!(coins);
        merge!(stars);
        merge!(tap_power);
        merge!(passive_income);
        merge!(pvp_rating);
        merge!(model_url);
        merge!(ton_wallet);

        // A zero tap power would stall the clicker entirely.
        if self.tap_power == 0 {
            self.tap_power = 1;
        }

        applied
    }

    /// Custom model URL, if one is set and non-empty.
    pub fn custom_model_url(&self) -> Option<&str> {
        self.model_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Progress toward the next level in `[0, 1]`.
    pub fn level_progress(&self) -> f32 {
        let needed = xp_for_level(self.level);
        if needed == 0 {
            return 0.0;
        }
        (self.xp as f64 / needed as f64).clamp(0.0, 1.0) as f32
    }
}

/// Experience required to complete `level`.
pub fn xp_for_level(level: u32) -> u64 {
    (100.0 * (level as f64).powf(1.5)) as u64
}

/// Compact number formatting for the HUD ("1.5K", "2.0M", "3.1B").
pub fn format_compact(n: u64) -> String {
    match n {
        n if n >= 1_000_000_000 => format!("{:.1}B", n as f64 / 1_000_000_000.0),
        n if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        n => n.to_string(),
    }
}

/// Wire shape of the `player` object in the state response.
///
/// Every field is optional; absent keys leave the local value untouched.
/// For `model_url` and `ton_wallet` an explicit `null` clears the field.
/// Field meanings match [`PlayerState`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<Archetype>,
    /// Display only, derived from `archetype`; never merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_power: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_income: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvp_rating: Option<i32>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub model_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ton_wallet: Option<Option<String>>,
}

impl From<&PlayerState> for PlayerSnapshot {
    fn from(state: &PlayerState) -> Self {
        Self {
            id: Some(state.id),
            tg_id: Some(state.tg_id),
            name: Some(state.name.clone()),
            avatar: Some(state.avatar.clone()),
            archetype: Some(state.archetype),
            archetype_emoji: Some(state.archetype.emoji().to_string()),
            level: Some(state.level),
            xp: Some(state.xp),
            coins: Some(state.coins),
            stars: Some(state.stars),
            tap_power: Some(state.tap_power),
            passive_income: Some(state.passive_income),
            pvp_rating: Some(state.pvp_rating),
            model_url: Some(state.model_url.clone()),
            ton_wallet: Some(state.ton_wallet.clone()),
        }
    }
}

/// Distinguish `"key": null` (present, cleared) from a missing key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// TESTS
// =============================================================================
