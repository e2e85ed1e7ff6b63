//! Tap Batching
//!
//! Taps are credited locally the moment they happen and counted as pending.
//! The batcher hands out at most one [`FlushTicket`] at a time; the driver
//! sends it and reports back with [`TapBatcher::complete_flush`].
//!
//! ```text
//!   record_tap ──► pending += 1, coins += tap_power
//!   flush_if_due ─► ticket(min(pending, cap))      (only if none in flight)
//!   complete_flush(ok)  ─► pending -= sent, coins = total_coins
//!   complete_flush(err) ─► pending unchanged, retried next interval
//! ```

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::game::state::PlayerState;
use crate::network::client::SyncError;
use crate::network::protocol::TapResponse;

/// World-space position of a tap, as reported by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldPoint {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl WorldPoint {
    /// Create a point.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Presentation request produced by a single tap.
#[derive(Debug, Clone, PartialEq)]
pub struct TapReaction {
    /// Where the tap landed.
    pub point: WorldPoint,
    /// Coins granted by this tap.
    pub reward: u32,
    /// Local coin balance after the tap.
    pub coins: u64,
}

impl TapReaction {
    /// Floating text shown above the character.
    pub fn floating_text(&self) -> String {
        format!("+{}", self.reward)
    }
}

/// Host-side presentation collaborator.
///
/// The core never touches the scene graph; it asks the host to play the tap
/// reaction (animation, particle effect, floating text) and to refresh the
/// coin display.
pub trait TapPresenter {
    /// A tap was credited.
    fn on_tap(&mut self, reaction: &TapReaction);

    /// The displayed coin balance should change.
    fn on_coins_changed(&mut self, _coins: u64) {}
}

impl TapPresenter for () {
    fn on_tap(&mut self, _reaction: &TapReaction) {}
}

/// Taps recorded locally but not yet acknowledged by the server.
///
/// `in_flight` is the portion currently being sent; it stays counted in
/// `pending` until the server acknowledges it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingTapCounter {
    pending: u32,
    in_flight: Option<u32>,
}

impl PendingTapCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more tap.
    pub fn record(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    /// Unacknowledged taps, including the in-flight batch.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Size of the batch currently being sent.
    pub fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    /// Reserve up to `cap` taps for sending. Returns `None` while another
    /// batch is in flight or when there is nothing to send.
    pub fn reserve(&mut self, cap: u32) -> Option<u32> {
        if self.in_flight.is_some() || self.pending == 0 || cap == 0 {
            return None;
        }
        let batch = self.pending.min(cap);
        self.in_flight = Some(batch);
        Some(batch)
    }

    /// The in-flight batch was accepted by the server.
    pub fn acknowledge(&mut self) -> u32 {
        let sent = self.in_flight.take().unwrap_or(0);
        self.pending = self.pending.saturating_sub(sent);
        sent
    }

    /// The in-flight batch failed; keep it pending for the next attempt.
    pub fn release(&mut self) -> u32 {
        self.in_flight.take().unwrap_or(0)
    }
}

/// A reserved batch of taps. Must be handed back to
/// [`TapBatcher::complete_flush`] exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTicket {
    id: u64,
    taps: u32,
}

impl FlushTicket {
    /// Number of taps to send.
    pub fn taps(&self) -> u32 {
        self.taps
    }
}

/// Result of completing a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Server accepted the batch; local coins were reconciled.
    Acknowledged {
        /// Taps removed from the pending counter.
        sent: u32,
        /// Authoritative coin balance.
        total_coins: u64,
    },
    /// Request failed; the batch stays pending.
    Retained {
        /// Taps that will be retried.
        taps: u32,
    },
    /// Ticket did not match the in-flight batch and was ignored.
    Stale,
}

/// Tap batching state machine.
#[derive(Debug, Clone)]
pub struct TapBatcher {
    counter: PendingTapCounter,
    interval: Duration,
    max_batch: u32,
    since_last_flush: Duration,
    current: Option<FlushTicket>,
    next_ticket_id: u64,
    taps_recorded: u64,
    taps_acknowledged: u64,
}

impl TapBatcher {
    /// Create a batcher flushing every `interval`, at most `max_batch` taps
    /// per request.
    pub fn new(interval: Duration, max_batch: u32) -> Self {
        Self {
            counter: PendingTapCounter::new(),
            interval,
            max_batch: max_batch.max(1),
            since_last_flush: Duration::ZERO,
            current: None,
            next_ticket_id: 1,
            taps_recorded: 0,
            taps_acknowledged: 0,
        }
    }

    /// Create a batcher from client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.sync_interval, config.max_batch_size)
    }

    /// Unacknowledged taps.
    pub fn pending(&self) -> u32 {
        self.counter.pending()
    }

    /// Whether a batch is currently in flight.
    pub fn is_flushing(&self) -> bool {
        self.current.is_some()
    }

    /// Configured batch cap.
    pub fn max_batch(&self) -> u32 {
        self.max_batch
    }

    /// Configured flush interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Taps recorded since creation.
    pub fn taps_recorded(&self) -> u64 {
        self.taps_recorded
    }

    /// Taps acknowledged by the server since creation.
    pub fn taps_acknowledged(&self) -> u64 {
        self.taps_acknowledged
    }

    /// Credit one tap locally and ask the presenter to react to it.
    pub fn record_tap<P: TapPresenter + ?Sized>(
        &mut self,
        player: &mut PlayerState,
        point: WorldPoint,
        presenter: &mut P,
    ) -> TapReaction {
        let reward = player.tap_power;
        player.coins = player.coins.saturating_add(reward as u64);
        self.counter.record();
        self.taps_recorded += 1;

        let reaction = TapReaction {
            point,
            reward,
            coins: player.coins,
        };
        presenter.on_tap(&reaction);
        presenter.on_coins_changed(player.coins);
        reaction
    }

    /// Advance the flush timer by `elapsed`. Returns a ticket when the
    /// interval has passed, no batch is in flight and taps are pending.
    pub fn flush_if_due(&mut self, elapsed: Duration) -> Option<FlushTicket> {
        self.since_last_flush = self.since_last_flush.saturating_add(elapsed);
        if self.since_last_flush < self.interval {
            return None;
        }
        self.since_last_flush = Duration::ZERO;

        if self.current.is_some() {
            debug!("Flush still in flight, skipping this interval");
            return None;
        }
        self.begin_flush()
    }

    /// Reserve a batch immediately, ignoring the timer.
    pub fn begin_flush(&mut self) -> Option<FlushTicket> {
        let taps = self.counter.reserve(self.max_batch)?;
        let ticket = FlushTicket {
            id: self.next_ticket_id,
            taps,
        };
        self.next_ticket_id += 1;
        self.current = Some(ticket);
        debug!("Flushing {} of {} pending taps", taps, self.counter.pending());
        Some(ticket)
    }

    /// Reserve the last batch before shutdown. Taps beyond the batch cap
    /// cannot be delivered and are reported.
    pub fn begin_final_flush(&mut self) -> Option<FlushTicket> {
        let ticket = self.begin_flush()?;
        let overflow = self.counter.pending() - ticket.taps;
        if overflow > 0 {
            warn!(
                "Final flush capped at {} taps; {} taps will not be delivered",
                ticket.taps, overflow
            );
        }
        Some(ticket)
    }

    /// Apply the server's answer for `ticket`.
    pub fn complete_flush(
        &mut self,
        ticket: FlushTicket,
        result: Result<TapResponse, SyncError>,
        player: &mut PlayerState,
    ) -> FlushOutcome {
        if self.current != Some(ticket) {
            warn!("Ignoring completion for stale flush ticket {}", ticket.id);
            return FlushOutcome::Stale;
        }
        self.current = None;

        match result {
            Ok(response) => {
                let sent = self.counter.acknowledge();
                self.taps_acknowledged += sent as u64;
                player.coins = response.total_coins;
                if let Some(tap_power) = response.tap_power {
                    player.tap_power = tap_power.max(1);
                }
                debug!(
                    "Flush acknowledged: {} taps, earned {}, total {}",
                    sent, response.earned, response.total_coins
                );
                FlushOutcome::Acknowledged {
                    sent,
                    total_coins: response.total_coins,
                }
            }
            Err(e) => {
                let taps = self.counter.release();
                warn!("Tap flush failed ({}); {} taps kept for retry", e, taps);
                FlushOutcome::Retained { taps }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
