//! Player Store
//!
//! In-memory player table keyed by Telegram user id.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use hypetown::network::protocol::StateResponse;
use hypetown::{Archetype, PlayerSnapshot, PlayerState};

use crate::auth::TelegramUser;
use crate::economy::{upgrade_levels, UpgradeKind};

/// Default avatar for newly registered players.
const DEFAULT_AVATAR: &str = "🎬";

/// Stored player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    /// Profile served to the client.
    pub state: PlayerState,
    /// Owned clicker upgrades.
    pub upgrades: BTreeMap<UpgradeKind, u32>,
    /// Last authenticated request.
    pub last_active: DateTime<Utc>,
}

impl PlayerRecord {
    /// Fresh player for a Telegram user.
    pub fn new(id: i64, user: &TelegramUser) -> Self {
        Self {
            state: PlayerState {
                id,
                tg_id: user.id,
                name: user.display_name(),
                avatar: DEFAULT_AVATAR.to_string(),
                archetype: Archetype::Director,
                pvp_rating: 1000,
                ..Default::default()
            },
            upgrades: BTreeMap::new(),
            last_active: Utc::now(),
        }
    }

    /// Body of `GET /api/state`.
    pub fn to_state_response(&self) -> StateResponse {
        StateResponse {
            player: PlayerSnapshot::from(&self.state),
            upgrades: upgrade_levels(&self.upgrades),
        }
    }
}

/// Player table.
pub struct PlayerStore {
    players: RwLock<BTreeMap<i64, PlayerRecord>>,
    next_id: AtomicI64,
}

impl PlayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            players: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Snapshot of a player.
    pub async fn get(&self, tg_id: i64) -> Option<PlayerRecord> {
        self.players.read().await.get(&tg_id).cloned()
    }

    /// Insert or replace a player. Assigns an id when `state.id` is 0.
    pub async fn insert(&self, mut record: PlayerRecord) -> PlayerRecord {
        if record.state.id == 0 {
            record.state.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        }
        self.players
            .write()
            .await
            .insert(record.state.tg_id, record.clone());
        record
    }

    /// Return the player for `user`, creating one if absent.
    pub async fn get_or_register(&self, user: &TelegramUser) -> PlayerRecord {
        let mut players = self.players.write().await;
        if let Some(existing) = players.get(&user.id) {
            return existing.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = PlayerRecord::new(id, user);
        tracing::info!(tg_id = user.id, id, name = %record.state.name, "Registered player");
        players.insert(user.id, record.clone());
        record
    }

    /// Mutate a player under the write lock. Returns `None` if unknown.
    pub async fn update<R>(
        &self,
        tg_id: i64,
        f: impl FnOnce(&mut PlayerRecord) -> R,
    ) -> Option<R> {
        let mut players = self.players.write().await;
        let record = players.get_mut(&tg_id)?;
        record.last_active = Utc::now();
        Some(f(record))
    }

    /// Number of players.
    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}
