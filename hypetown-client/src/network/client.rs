//! Background HTTP requests for the sync systems

use bevy::prelude::*;
use bevy_tokio_tasks::TokioTasksRuntime;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hypetown::game::model::resolve_character;
use hypetown::network::protocol::{StateResponse, TapResponse};
use hypetown::{ApiClient, CharacterModel, FlushTicket, GameApi, PlayerState, SyncError};

/// Result of a background request, applied on the main thread.
pub enum SyncReply {
    State(Result<StateResponse, SyncError>),
    Character(CharacterModel),
    Flushed {
        ticket: FlushTicket,
        result: Result<TapResponse, SyncError>,
    },
}

/// Backend connection
#[derive(Resource, Clone)]
pub struct Backend {
    pub api: ApiClient,
    pub shutdown_timeout: Duration,
}

/// Thread-safe queue for replies from background tasks
#[derive(Resource, Default, Clone)]
pub struct SyncReplies {
    pub queue: Arc<Mutex<Vec<SyncReply>>>,
}

impl SyncReplies {
    pub fn push(&self, reply: SyncReply) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(reply);
        }
    }

    /// Take every queued reply.
    pub fn drain(&self) -> Vec<SyncReply> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Load the player profile.
pub fn request_state(runtime: &TokioTasksRuntime, backend: &Backend, replies: &SyncReplies) {
    let api = backend.api.clone();
    let replies = replies.clone();

    runtime.spawn_background_task(move |_ctx| async move {
        info!("Loading player state from {}", api.base_url());
        let result = api.fetch_state().await;
        replies.push(SyncReply::State(result));
    });
}

/// Fetch the custom model, falling back to the archetype default.
pub fn request_character(
    runtime: &TokioTasksRuntime,
    backend: &Backend,
    replies: &SyncReplies,
    player: PlayerState,
) {
    let api = backend.api.clone();
    let replies = replies.clone();

    runtime.spawn_background_task(move |_ctx| async move {
        let model = resolve_character(&api, &player).await;
        replies.push(SyncReply::Character(model));
    });
}

/// Send one tap batch.
pub fn send_batch(
    runtime: &TokioTasksRuntime,
    backend: &Backend,
    replies: &SyncReplies,
    ticket: FlushTicket,
) {
    let api = backend.api.clone();
    let replies = replies.clone();

    runtime.spawn_background_task(move |_ctx| async move {
        let result = api.send_taps(ticket.taps()).await;
        replies.push(SyncReply::Flushed { ticket, result });
    });
}

/// Send the last batch and wait for the answer. Used on exit, when no
/// more frames will run to pick up a queued reply.
pub fn send_batch_blocking(
    runtime: &TokioTasksRuntime,
    backend: &Backend,
    ticket: FlushTicket,
) -> Result<TapResponse, SyncError> {
    let api = backend.api.clone();
    let deadline = backend.shutdown_timeout;

    runtime.runtime().block_on(async move {
        tokio::time::timeout(deadline, api.send_taps(ticket.taps()))
            .await
            .unwrap_or_else(|_| Err(SyncError::Interrupted("final flush timed out".into())))
    })
}
