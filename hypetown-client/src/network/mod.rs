//! Network module - HTTP sync with the HYPETOWN backend
//!
//! Owns the player state and tap batcher. Requests run on the tokio
//! runtime; their replies are queued and applied here each frame.

mod client;

pub use client::*;

use bevy::prelude::*;
use bevy_tokio_tasks::TokioTasksRuntime;
use std::time::{Duration, Instant};

use hypetown::{
    ApiClient, CharacterModel, ClientConfig, FlushOutcome, FlushTicket, PlayerState, SyncError,
    TapBatcher,
};
use hypetown::network::protocol::TapResponse;

use crate::AppState;

pub struct SyncPlugin;

impl Plugin for SyncPlugin {
    fn build(&self, app: &mut App) {
        app
            .insert_resource(PlayerSession::new(&ClientConfig::default()))
            .init_resource::<SyncReplies>()
            .add_event::<CoinsChanged>()
            .add_event::<CharacterReady>()
            .add_systems(Startup, connect_backend)
            .add_systems(Update, (
                poll_sync_replies,
                drive_flush.run_if(in_state(AppState::Playing)),
            ))
            .add_systems(Last, flush_on_exit);
    }
}

/// Local player state and pending taps
#[derive(Resource)]
pub struct PlayerSession {
    pub player: PlayerState,
    pub batcher: TapBatcher,
    pub character: Option<CharacterModel>,
}

impl PlayerSession {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            player: PlayerState::default(),
            batcher: TapBatcher::from_config(config),
            character: None,
        }
    }

    /// Apply a flush result. Returns the new balance when coins changed.
    pub fn complete_flush(
        &mut self,
        ticket: FlushTicket,
        result: Result<TapResponse, SyncError>,
    ) -> Option<u64> {
        let PlayerSession { player, batcher, .. } = self;
        match batcher.complete_flush(ticket, result, player) {
            FlushOutcome::Acknowledged { total_coins, .. } => Some(total_coins),
            FlushOutcome::Retained { .. } | FlushOutcome::Stale => None,
        }
    }
}

/// Displayed coin balance changed
#[derive(Event)]
pub struct CoinsChanged(pub u64);

/// Character model resolved
#[derive(Event)]
pub struct CharacterReady(pub CharacterModel);

/// Read configuration and start loading the player.
fn connect_backend(
    mut commands: Commands,
    runtime: Res<TokioTasksRuntime>,
    replies: Res<SyncReplies>,
    mut session: ResMut<PlayerSession>,
    mut app_state: ResMut<NextState<AppState>>,
) {
    let config = ClientConfig::from_env();
    session.batcher = TapBatcher::from_config(&config);

    let api = config
        .validate()
        .map_err(|e| e.to_string())
        .and_then(|_| ApiClient::new(&config).map_err(|e| e.to_string()));

    match api {
        Ok(api) => {
            let backend = Backend {
                api,
                shutdown_timeout: config.shutdown_timeout,
            };
            request_state(&runtime, &backend, &replies);
            commands.insert_resource(backend);
        }
        Err(e) => {
            error!("Backend unavailable ({}), playing offline", e);
            session.character = Some(CharacterModel::Default(session.player.archetype));
            app_state.set(AppState::Playing);
        }
    }
}

/// Apply replies from background tasks.
fn poll_sync_replies(
    runtime: Res<TokioTasksRuntime>,
    backend: Option<Res<Backend>>,
    replies: Res<SyncReplies>,
    mut session: ResMut<PlayerSession>,
    mut coins_events: EventWriter<CoinsChanged>,
    mut character_events: EventWriter<CharacterReady>,
    mut app_state: ResMut<NextState<AppState>>,
) {
    for reply in replies.drain() {
        match reply {
            SyncReply::State(result) => {
                match result {
                    Ok(state) => {
                        let applied = session.player.apply_snapshot(&state.player);
                        info!(
                            "Loaded player {} ({} fields, {} upgrades)",
                            session.player.name,
                            applied,
                            state.upgrades.len()
                        );
                    }
                    Err(e) if e.is_unauthorized() => {
                        error!("Session rejected by backend, taps will not be saved");
                    }
                    Err(e) => {
                        error!("Failed to load player state: {}", e);
                    }
                }
                coins_events.send(CoinsChanged(session.player.coins));
                if let Some(backend) = &backend {
                    request_character(&runtime, backend, &replies, session.player.clone());
                }
                app_state.set(AppState::Playing);
            }
            SyncReply::Character(model) => {
                info!("Character model: {}", model.source());
                session.character = Some(model.clone());
                character_events.send(CharacterReady(model));
            }
            SyncReply::Flushed { ticket, result } => {
                if let Some(coins) = session.complete_flush(ticket, result) {
                    coins_events.send(CoinsChanged(coins));
                }
            }
        }
    }
}

/// Start a batch when the sync interval has passed.
fn drive_flush(
    time: Res<Time>,
    runtime: Res<TokioTasksRuntime>,
    backend: Option<Res<Backend>>,
    replies: Res<SyncReplies>,
    mut session: ResMut<PlayerSession>,
) {
    let Some(backend) = backend else {
        return;
    };

    if let Some(ticket) = session.batcher.flush_if_due(time.delta()) {
        send_batch(&runtime, &backend, &replies, ticket);
    }
}

/// Deliver what is still pending before the app closes.
fn flush_on_exit(
    mut exits: EventReader<AppExit>,
    runtime: Res<TokioTasksRuntime>,
    backend: Option<Res<Backend>>,
    replies: Res<SyncReplies>,
    mut session: ResMut<PlayerSession>,
) {
    if exits.read().next().is_none() {
        return;
    }
    let Some(backend) = backend else {
        warn!("Exiting offline, {} taps not saved", session.batcher.pending());
        return;
    };

    // No frames will run after this one; wait for the in-flight reply here.
    let deadline = Instant::now() + backend.shutdown_timeout;
    while session.batcher.is_flushing() && Instant::now() < deadline {
        for reply in replies.drain() {
            if let SyncReply::Flushed { ticket, result } = reply {
                session.complete_flush(ticket, result);
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    if let Some(ticket) = session.batcher.begin_final_flush() {
        let result = send_batch_blocking(&runtime, &backend, ticket);
        session.complete_flush(ticket, result);
    }

    info!(
        "Session ended: {} taps recorded, {} acknowledged, {} undelivered, coins={}",
        session.batcher.taps_recorded(),
        session.batcher.taps_acknowledged(),
        session.batcher.pending(),
        session.player.coins
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_pending(taps: u32) -> (PlayerSession, FlushTicket) {
        let mut session = PlayerSession::new(&ClientConfig::default());
        for _ in 0..taps {
            let PlayerSession { player, batcher, .. } = &mut session;
            batcher.record_tap(player, hypetown::WorldPoint::default(), &mut ());
        }
        let ticket = session.batcher.begin_flush().unwrap();
        (session, ticket)
    }

    #[test]
    fn test_complete_flush_reports_new_balance() {
        let (mut session, ticket) = session_with_pending(3);
        let coins = session.complete_flush(
            ticket,
            Ok(TapResponse { earned: 3, total_coins: 103, tap_power: None }),
        );
        assert_eq!(coins, Some(103));
        assert_eq!(session.player.coins, 103);
        assert_eq!(session.batcher.pending(), 0);
    }

    #[test]
    fn test_failed_flush_keeps_taps() {
        let (mut session, ticket) = session_with_pending(2);
        let coins = session.complete_flush(ticket, Err(SyncError::Interrupted("offline".into())));
        assert_eq!(coins, None);
        assert_eq!(session.batcher.pending(), 2);
        assert_eq!(session.player.coins, 2);
    }

    #[test]
    fn test_sync_replies_drain() {
        let replies = SyncReplies::default();
        replies.push(SyncReply::Character(CharacterModel::Default(Default::default())));
        assert_eq!(replies.drain().len(), 1);
        assert!(replies.drain().is_empty());
    }
}
