//! Session Management
//!
//! [`GameSession`] owns the player state for the lifetime of the app and
//! glues the tap batcher to a [`GameApi`]. [`SessionDriver`] is the tokio
//! event loop for hosts that feed taps through a channel.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::game::model::{resolve_character, CharacterModel, ModelFetcher};
use crate::game::state::PlayerState;
use crate::game::tap::{FlushOutcome, FlushTicket, TapBatcher, TapPresenter, TapReaction, WorldPoint};
use crate::network::client::{GameApi, SyncError};
use crate::network::protocol::TapResponse;

/// Top-level session controller.
pub struct GameSession<A> {
    api: A,
    config: ClientConfig,
    player: PlayerState,
    batcher: TapBatcher,
    character: Option<CharacterModel>,
}

impl<A: GameApi> GameSession<A> {
    /// Create a session with default player state.
    pub fn new(api: A, config: ClientConfig) -> Self {
        let batcher = TapBatcher::from_config(&config);
        Self {
            api,
            config,
            player: PlayerState::default(),
            batcher,
            character: None,
        }
    }

    /// Current player state.
    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    /// Tap batcher.
    pub fn batcher(&self) -> &TapBatcher {
        &self.batcher
    }

    /// Resolved character model, once loaded.
    pub fn character(&self) -> Option<&CharacterModel> {
        self.character.as_ref()
    }

    /// Backend handle.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch authoritative state and merge it into the local player.
    pub async fn load_state(&mut self) -> Result<usize, SyncError> {
        let response = self.api.fetch_state().await?;
        let applied = self.player.apply_snapshot(&response.player);
        info!(
            "State loaded: {} ({}), coins={}",
            self.player.name, self.player.archetype, self.player.coins
        );
        Ok(applied)
    }

    /// Load state and the character model. A failed state load is logged
    /// and the session continues with what it has.
    pub async fn start<P>(&mut self, presenter: &mut P) -> &CharacterModel
    where
        A: ModelFetcher,
        P: TapPresenter + ?Sized,
    {
        if let Err(e) = self.load_state().await {
            error!("Failed to load game state: {}", e);
        }
        presenter.on_coins_changed(self.player.coins);
        self.refresh_character().await
    }

    /// Resolve the character model for the current player state.
    pub async fn refresh_character(&mut self) -> &CharacterModel
    where
        A: ModelFetcher,
    {
        let model = resolve_character(&self.api, &self.player).await;
        self.character.insert(model)
    }

    /// Credit a tap locally.
    pub fn record_tap<P: TapPresenter + ?Sized>(&mut self, point: WorldPoint, presenter: &mut P) -> TapReaction {
        self.batcher.record_tap(&mut self.player, point, presenter)
    }

    /// Advance the flush timer; returns a batch to send when one is due.
    pub fn poll_flush(&mut self, elapsed: std::time::Duration) -> Option<FlushTicket> {
        self.batcher.flush_if_due(elapsed)
    }

    /// Apply the result of sending `ticket`.
    pub fn complete_flush<P: TapPresenter + ?Sized>(
        &mut self,
        ticket: FlushTicket,
        result: Result<TapResponse, SyncError>,
        presenter: &mut P,
    ) -> FlushOutcome {
        let outcome = self.batcher.complete_flush(ticket, result, &mut self.player);
        if matches!(outcome, FlushOutcome::Acknowledged { .. }) {
            presenter.on_coins_changed(self.player.coins);
        }
        outcome
    }

    /// Store a new model URL on the server, then locally.
    pub async fn update_model_url(&mut self, model_url: &str) -> Result<(), SyncError> {
        let response = self.api.update_model_url(model_url).await?;
        self.player.model_url = Some(response.model_url.unwrap_or_else(|| model_url.to_string()));
        info!("Model URL updated");
        Ok(())
    }

    /// Link a wallet on the server, then locally.
    pub async fn connect_wallet(&mut self, address: &str) -> Result<(), SyncError> {
        let response = self.api.connect_wallet(address).await?;
        self.player.ton_wallet = Some(response.wallet.unwrap_or_else(|| address.to_string()));
        info!("Wallet connected");
        Ok(())
    }
}

/// Totals reported when a driver stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Taps credited locally.
    pub taps_recorded: u64,
    /// Taps acknowledged by the server.
    pub taps_acknowledged: u64,
    /// Taps still unacknowledged after the final flush.
    pub taps_dropped: u32,
    /// Local coin balance at exit.
    pub final_coins: u64,
}

type InFlight = Option<(FlushTicket, JoinHandle<Result<TapResponse, SyncError>>)>;

/// Tokio event loop around a [`GameSession`].
///
/// Taps arrive on an `mpsc` channel; a timer drives flushes; each flush runs
/// as its own task so taps keep flowing while it is outstanding.
pub struct SessionDriver<A> {
    session: GameSession<A>,
}

impl<A> SessionDriver<A>
where
    A: GameApi + Clone + Send + Sync + 'static,
{
    /// Wrap a session.
    pub fn new(session: GameSession<A>) -> Self {
        Self { session }
    }

    /// Access the wrapped session.
    pub fn session(&self) -> &GameSession<A> {
        &self.session
    }

    /// Run until `shutdown` fires (or its sender is dropped) or the tap
    /// channel closes, then make one final flush.
    pub async fn run<P: TapPresenter + ?Sized>(
        mut self,
        mut taps: mpsc::Receiver<WorldPoint>,
        mut shutdown: oneshot::Receiver<()>,
        presenter: &mut P,
    ) -> SessionSummary {
        // tokio panics on a zero period.
        let period = self.session.config.sync_interval.max(std::time::Duration::from_millis(1));
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut last_tick = Instant::now();
        let mut in_flight: InFlight = None;

        loop {
            tokio::select! {
                tap = taps.recv() => match tap {
                    Some(point) => {
                        self.session.record_tap(point, presenter);
                    }
                    None => {
                        info!("Tap channel closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now - last_tick;
                    last_tick = now;
                    if let Some(ticket) = self.session.poll_flush(elapsed) {
                        in_flight = Some((ticket, self.spawn_send(ticket)));
                    }
                },
                result = wait_in_flight(&mut in_flight) => {
                    if let Some((ticket, _)) = in_flight.take() {
                        self.session.complete_flush(ticket, result, presenter);
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    // Taps already queued still count.
                    taps.close();
                    while let Ok(point) = taps.try_recv() {
                        self.session.record_tap(point, presenter);
                    }
                    break;
                },
            }
        }

        self.finish(in_flight, presenter).await
    }

    fn spawn_send(&self, ticket: FlushTicket) -> JoinHandle<Result<TapResponse, SyncError>> {
        let api = self.session.api.clone();
        tokio::spawn(async move { api.send_taps(ticket.taps()).await })
    }

    async fn finish<P: TapPresenter + ?Sized>(mut self, in_flight: InFlight, presenter: &mut P) -> SessionSummary {
        let deadline = self.session.config.shutdown_timeout;

        let mut abandoned = false;
        if let Some((ticket, mut handle)) = in_flight {
            match time::timeout(deadline, &mut handle).await {
                Ok(joined) => {
                    self.session.complete_flush(ticket, flatten(joined), presenter);
                }
                Err(_) => {
                    // The request may still land on the server, so its taps
                    // stay reserved and nothing else is sent.
                    handle.abort();
                    abandoned = true;
                    warn!("In-flight flush of {} taps outlived shutdown; skipping final flush", ticket.taps());
                }
            }
        }

        let final_ticket = if abandoned { None } else { self.session.batcher.begin_final_flush() };
        if let Some(ticket) = final_ticket {
            let result = time::timeout(deadline, self.session.api.send_taps(ticket.taps()))
                .await
                .unwrap_or_else(|_| Err(SyncError::Interrupted("final flush timed out".into())));
            self.session.complete_flush(ticket, result, presenter);
        }

        let summary = SessionSummary {
            taps_recorded: self.session.batcher.taps_recorded(),
            taps_acknowledged: self.session.batcher.taps_acknowledged(),
            taps_dropped: self.session.batcher.pending(),
            final_coins: self.session.player.coins,
        };
        if summary.taps_dropped > 0 {
            warn!("{} taps were not delivered before shutdown", summary.taps_dropped);
        }
        info!(
            "Session ended: {} taps recorded, {} acknowledged, coins={}",
            summary.taps_recorded, summary.taps_acknowledged, summary.final_coins
        );
        summary
    }
}

async fn wait_in_flight(in_flight: &mut InFlight) -> Result<TapResponse, SyncError> {
    match in_flight {
        Some((_, handle)) => flatten(handle.await),
        None => std::future::pending().await,
    }
}

fn flatten(
    joined: Result<Result<TapResponse, SyncError>, tokio::task::JoinError>,
) -> Result<TapResponse, SyncError> {
    joined.unwrap_or_else(|e| Err(SyncError::Interrupted(e.to_string())))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::ModelError;
    use crate::game::state::{Archetype, PlayerSnapshot};
    use crate::network::protocol::{ModelResponse, StateResponse, WalletResponse};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Backend {
        send_delay: Option<Duration>,
        coins: u64,
        tap_power: u32,
        failures_left: u32,
        batches: Vec<u32>,
        state_unavailable: bool,
    }

    #[derive(Clone, Default)]
    struct FakeApi {
        inner: Arc<Mutex<Backend>>,
    }

    impl FakeApi {
        fn with_coins(coins: u64, tap_power: u32) -> Self {
            let api = Self::default();
            {
                let mut backend = api.inner.lock().unwrap();
                backend.coins = coins;
                backend.tap_power = tap_power;
            }
            api
        }

        fn fail_next(&self, n: u32) {
            self.inner.lock().unwrap().failures_left = n;
        }

        fn batches(&self) -> Vec<u32> {
            self.inner.lock().unwrap().batches.clone()
        }

        fn coins(&self) -> u64 {
            self.inner.lock().unwrap().coins
        }
    }

    impl GameApi for FakeApi {
        async fn fetch_state(&self) -> Result<StateResponse, SyncError> {
            let backend = self.inner.lock().unwrap();
            if backend.state_unavailable {
                return Err(SyncError::Status { endpoint: "/api/state", status: 502 });
            }
            Ok(StateResponse {
                player: PlayerSnapshot {
                    name: Some("Tester".into()),
                    archetype: Some(Archetype::Producer),
                    coins: Some(backend.coins),
                    tap_power: Some(backend.tap_power),
                    ..Default::default()
                },
                upgrades: Vec::new(),
            })
        }

        async fn send_taps(&self, taps: u32) -> Result<TapResponse, SyncError> {
            let delay = self.inner.lock().unwrap().send_delay.take();
            if let Some(delay) = delay {
                time::sleep(delay).await;
            }
            let mut backend = self.inner.lock().unwrap();
            if backend.failures_left > 0 {
                backend.failures_left -= 1;
                return Err(SyncError::Status { endpoint: "/api/tap", status: 503 });
            }
            let earned = backend.tap_power as u64 * taps as u64;
            backend.coins += earned;
            backend.batches.push(taps);
            Ok(TapResponse {
                earned,
                total_coins: backend.coins,
                tap_power: Some(backend.tap_power),
            })
        }

        async fn update_model_url(&self, model_url: &str) -> Result<ModelResponse, SyncError> {
            Ok(ModelResponse { ok: true, model_url: Some(model_url.to_string()) })
        }

        async fn connect_wallet(&self, address: &str) -> Result<WalletResponse, SyncError> {
            Ok(WalletResponse { ok: true, wallet: Some(address.to_string()) })
        }
    }

    impl ModelFetcher for FakeApi {
        async fn fetch_model(&self, _url: &str) -> Result<Vec<u8>, ModelError> {
            Err(ModelError::Status(404))
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            sync_interval: Duration::from_secs(2),
            max_batch_size: 50,
            shutdown_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct CoinDisplay {
        shown: Option<u64>,
        reactions: usize,
    }

    impl TapPresenter for CoinDisplay {
        fn on_tap(&mut self, _reaction: &TapReaction) {
            self.reactions += 1;
        }

        fn on_coins_changed(&mut self, coins: u64) {
            self.shown = Some(coins);
        }
    }

    #[tokio::test]
    async fn test_start_loads_state_and_falls_back_model() {
        let api = FakeApi::with_coins(250, 2);
        let mut session = GameSession::new(api, config());
        let mut display = CoinDisplay::default();

        let model = session.start(&mut display).await.clone();

        assert_eq!(model, CharacterModel::Default(Archetype::Producer));
        assert_eq!(session.player().coins, 250);
        assert_eq!(session.player().tap_power, 2);
        assert_eq!(display.shown, Some(250));
    }

    #[tokio::test]
    async fn test_start_survives_state_failure() {
        let api = FakeApi::default();
        api.inner.lock().unwrap().state_unavailable = true;
        let mut session = GameSession::new(api, config());

        let model = session.start(&mut ()).await.clone();

        assert_eq!(model, CharacterModel::Default(Archetype::Director));
        assert_eq!(session.player().coins, 0);
    }

    #[tokio::test]
    async fn test_manual_flush_cycle() {
        let api = FakeApi::with_coins(100, 1);
        let mut session = GameSession::new(api.clone(), config());
        session.load_state().await.unwrap();

        for _ in 0..5 {
            session.record_tap(WorldPoint::default(), &mut ());
        }
        assert_eq!(session.player().coins, 105);

        let ticket = session.poll_flush(Duration::from_secs(2)).unwrap();
        let result = session.api().send_taps(ticket.taps()).await;
        let outcome = session.complete_flush(ticket, result, &mut ());

        assert_eq!(outcome, FlushOutcome::Acknowledged { sent: 5, total_coins: 105 });
        assert_eq!(session.player().coins, api.coins());
        assert_eq!(session.batcher().pending(), 0);
    }

    #[tokio::test]
    async fn test_model_and_wallet_updates() {
        let mut session = GameSession::new(FakeApi::default(), config());

        session.update_model_url("https://cdn/x.glb").await.unwrap();
        session.connect_wallet("UQwallet").await.unwrap();

        assert_eq!(session.player().model_url.as_deref(), Some("https://cdn/x.glb"));
        assert_eq!(session.player().ton_wallet.as_deref(), Some("UQwallet"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_batches_and_reconciles() {
        let api = FakeApi::with_coins(0, 1);
        let session = GameSession::new(api.clone(), config());
        let (tap_tx, tap_rx) = mpsc::channel(256);
        let (stop_tx, stop_rx) = oneshot::channel();

        let feeder = tokio::spawn(async move {
            for _ in 0..120 {
                tap_tx.send(WorldPoint::default()).await.unwrap();
            }
            // Enough intervals for three capped batches.
            time::sleep(Duration::from_secs(10)).await;
            let _ = stop_tx.send(());
            tap_tx
        });

        let mut display = CoinDisplay::default();
        let summary = SessionDriver::new(session).run(tap_rx, stop_rx, &mut display).await;
        feeder.await.unwrap();

        assert_eq!(summary.taps_recorded, 120);
        assert_eq!(summary.taps_acknowledged, 120);
        assert_eq!(summary.taps_dropped, 0);
        assert_eq!(summary.final_coins, 120);
        assert_eq!(display.reactions, 120);
        assert_eq!(display.shown, Some(120));
        assert!(api.batches().iter().all(|&b| b <= 50));
        assert_eq!(api.batches().iter().sum::<u32>(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_retries_after_failure() {
        let api = FakeApi::with_coins(0, 1);
        api.fail_next(2);
        let session = GameSession::new(api.clone(), config());
        let (tap_tx, tap_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel();

        let feeder = tokio::spawn(async move {
            for _ in 0..10 {
                tap_tx.send(WorldPoint::default()).await.unwrap();
            }
            time::sleep(Duration::from_secs(9)).await;
            let _ = stop_tx.send(());
            tap_tx
        });

        let summary = SessionDriver::new(session).run(tap_rx, stop_rx, &mut ()).await;
        feeder.await.unwrap();

        assert_eq!(summary.taps_acknowledged, 10);
        assert_eq!(api.batches(), vec![10]);
        assert_eq!(api.coins(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_sends_final_capped_batch() {
        let api = FakeApi::with_coins(0, 1);
        let session = GameSession::new(api.clone(), config());
        let (tap_tx, tap_rx) = mpsc::channel(128);
        let (stop_tx, stop_rx) = oneshot::channel();

        for _ in 0..70 {
            tap_tx.send(WorldPoint::default()).await.unwrap();
        }
        // Closing the channel stops the loop before any interval elapses.
        drop(tap_tx);

        let summary = SessionDriver::new(session).run(tap_rx, stop_rx, &mut ()).await;
        drop(stop_tx);

        assert_eq!(api.batches(), vec![50]);
        assert_eq!(summary.taps_acknowledged, 50);
        assert_eq!(summary.taps_dropped, 20);
        assert_eq!(summary.final_coins, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_records_queued_taps() {
        let api = FakeApi::with_coins(0, 1);
        let session = GameSession::new(api.clone(), config());
        let (tap_tx, tap_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel();

        for _ in 0..10 {
            tap_tx.send(WorldPoint::default()).await.unwrap();
        }
        stop_tx.send(()).unwrap();

        let summary = SessionDriver::new(session).run(tap_rx, stop_rx, &mut ()).await;

        assert_eq!(summary.taps_recorded, 10);
        assert_eq!(summary.taps_acknowledged, 10);
        assert_eq!(summary.taps_dropped, 0);
        assert_eq!(api.batches(), vec![10]);
        drop(tap_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_flush_is_not_resent_on_shutdown() {
        let api = FakeApi::with_coins(0, 1);
        api.inner.lock().unwrap().send_delay = Some(Duration::from_secs(5));
        let session = GameSession::new(api.clone(), config());
        let (tap_tx, tap_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = oneshot::channel();

        let feeder = tokio::spawn(async move {
            for _ in 0..10 {
                tap_tx.send(WorldPoint::default()).await.unwrap();
            }
            // The first flush starts at 2s and is still running at shutdown.
            time::sleep(Duration::from_millis(2500)).await;
            let _ = stop_tx.send(());
            tap_tx
        });

        let summary = SessionDriver::new(session).run(tap_rx, stop_rx, &mut ()).await;
        feeder.await.unwrap();
        // Give an unaborted request every chance to complete.
        time::sleep(Duration::from_secs(10)).await;

        assert!(api.batches().is_empty());
        assert_eq!(api.coins(), 0);
        assert_eq!(summary.taps_recorded, 10);
        assert_eq!(summary.taps_acknowledged, 0);
        assert_eq!(summary.taps_dropped, 10);
    }
}
