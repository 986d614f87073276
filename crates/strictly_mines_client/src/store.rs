//! The held game: one authoritative snapshot plus everything derived from it.
//!
//! [`GameStore`] consumes a [`SubscriptionChannel`], screens every snapshot
//! against the invariants, installs the survivors wholesale, re-anchors both
//! clocks and republishes a [`StoreView`]. Readers never see a partially
//! applied snapshot.

use crate::{ChannelEvent, ClientConfig, ClockTicker, EventStream, PushTransport, SubscriptionChannel};
use crate::{SystemTimeSource, TimeSource, Topic};
use derive_getters::Getters;
use derive_more::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strictly_mines::{
    Game, GameId, PlayerId, ProtocolAnomaly, StatusView, check_transition, clock_anchors,
    derive_status, validate_snapshot,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Health of the push subscription as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Display)]
pub enum ConnectionState {
    /// No game is being followed.
    #[default]
    #[display("idle")]
    Idle,
    /// Subscribing for the first time.
    #[display("connecting")]
    Connecting,
    /// Snapshots are flowing.
    #[display("live")]
    Live,
    /// The subscription dropped; a retry is pending. The held snapshot stays.
    #[display("reconnecting ({reason})")]
    Reconnecting {
        /// Why the previous attempt ended.
        reason: String,
    },
}

/// Everything a view needs, published atomically after each change.
#[derive(Debug, Clone, Default, Getters)]
pub struct StoreView {
    /// The held snapshot.
    game: Option<Arc<Game>>,
    /// Status derived from `game` for the local player.
    status: Option<Result<StatusView, ProtocolAnomaly>>,
    /// Subscription health.
    connection: ConnectionState,
    /// Most recent protocol anomaly since the store started.
    anomaly: Option<ProtocolAnomaly>,
    /// Number of anomalies since the store started.
    anomaly_count: usize,
}

struct StoreState {
    generation: u64,
    topic: Option<Topic>,
    game: Option<Arc<Game>>,
    status: Option<Result<StatusView, ProtocolAnomaly>>,
    connection: ConnectionState,
    anomaly: Option<ProtocolAnomaly>,
    anomaly_count: usize,
    clocks: [ClockTicker; 2],
}

impl StoreState {
    fn view(&self) -> StoreView {
        StoreView {
            game: self.game.clone(),
            status: self.status.clone(),
            connection: self.connection.clone(),
            anomaly: self.anomaly.clone(),
            anomaly_count: self.anomaly_count,
        }
    }

    fn report(&mut self, anomaly: ProtocolAnomaly) {
        error!(anomaly = %anomaly, rejected = anomaly.rejects_snapshot(), "Protocol anomaly");
        self.anomaly = Some(anomaly);
        self.anomaly_count += 1;
    }

    /// Checks `game` against the held snapshot.
    ///
    /// `Err` rejects it. `Ok(Some(_))` installs it but reports the anomaly.
    fn screen(&self, game: &Game) -> Result<Option<ProtocolAnomaly>, ProtocolAnomaly> {
        validate_snapshot(game)?;
        if let Some(topic) = &self.topic {
            if topic.game_id() != game.id() {
                return Err(ProtocolAnomaly::ForeignGame {
                    expected: topic.game_id().clone(),
                    received: game.id().clone(),
                });
            }
        }
        match &self.game {
            Some(previous) => match check_transition(previous, game) {
                Ok(()) => Ok(None),
                Err(anomaly) if anomaly.rejects_snapshot() => Err(anomaly),
                Err(anomaly) => Ok(Some(anomaly)),
            },
            None => Ok(None),
        }
    }

    fn accept(&mut self, game: Game) {
        match self.screen(&game) {
            Err(anomaly) => {
                warn!(game_id = %game.id(), "Snapshot rejected, keeping previous state");
                self.report(anomaly);
                return;
            }
            Ok(Some(anomaly)) => self.report(anomaly),
            Ok(None) => {}
        }
        self.install(game);
    }

    fn install(&mut self, game: Game) {
        for (ticker, anchor) in self.clocks.iter_mut().zip(clock_anchors(&game)) {
            ticker.set_anchor(anchor);
        }

        let status = self.topic.as_ref().map(|topic| derive_status(&game, topic.player_id()));
        if let Some(Err(anomaly)) = &status {
            self.report(anomaly.clone());
        }
        debug!(game_id = %game.id(), phase = %game.phase(), "Snapshot installed");
        self.status = status;
        self.game = Some(Arc::new(game));
    }

    fn clear(&mut self) {
        self.topic = None;
        self.game = None;
        self.status = None;
        self.connection = ConnectionState::Idle;
        self.anomaly = None;
        self.anomaly_count = 0;
        for ticker in &mut self.clocks {
            ticker.reset(0);
        }
    }
}

struct Shared {
    state: Mutex<StoreState>,
    views: watch::Sender<Arc<StoreView>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` and republishes the view, all under the lock.
    fn update(&self, change: impl FnOnce(&mut StoreState)) {
        let mut state = self.lock();
        change(&mut state);
        self.views.send_replace(Arc::new(state.view()));
    }

    fn handle(&self, generation: u64, event: ChannelEvent) {
        self.update(|state| {
            if state.generation != generation {
                debug!("Dropping event from a previous session");
                return;
            }
            match event {
                ChannelEvent::Connected => {
                    info!("Subscription live");
                    state.connection = ConnectionState::Live;
                }
                ChannelEvent::Disconnected { reason } => {
                    state.connection = ConnectionState::Reconnecting { reason };
                }
                ChannelEvent::Malformed(anomaly) => state.report(anomaly),
                ChannelEvent::Snapshot(game) => state.accept(*game),
            }
        });
    }
}

/// Holds the authoritative snapshot of the followed game.
pub struct GameStore<T: PushTransport> {
    channel: SubscriptionChannel<T>,
    shared: Arc<Shared>,
    pump: Option<JoinHandle<()>>,
}

impl<T: PushTransport> GameStore<T> {
    /// Creates an idle store using the system clock.
    pub fn new(transport: Arc<T>, config: &ClientConfig) -> Self {
        Self::with_time_source(transport, config, Arc::new(SystemTimeSource))
    }

    /// Creates an idle store with an explicit time source for the clocks.
    pub fn with_time_source(
        transport: Arc<T>,
        config: &ClientConfig,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let frame = config.clock_frame();
        let state = StoreState {
            generation: 0,
            topic: None,
            game: None,
            status: None,
            connection: ConnectionState::Idle,
            anomaly: None,
            anomaly_count: 0,
            clocks: [
                ClockTicker::new(Arc::clone(&time), frame),
                ClockTicker::new(time, frame),
            ],
        };
        let (views, _) = watch::channel(Arc::new(StoreView::default()));
        Self {
            channel: SubscriptionChannel::new(transport, config.reconnect_delay()),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                views,
            }),
            pump: None,
        }
    }

    /// Follows `game_id` as `local`, replacing whatever was followed before.
    #[instrument(skip(self), fields(game_id = %game_id, local = %local))]
    pub fn start(&mut self, game_id: GameId, local: PlayerId) {
        self.stop();

        let mut generation = 0;
        self.shared.update(|state| {
            state.generation += 1;
            generation = state.generation;
            state.topic = Some(Topic::new(game_id.clone(), local.clone()));
            state.connection = ConnectionState::Connecting;
        });

        let events = self.channel.open(game_id, local);
        self.pump = Some(tokio::spawn(pump(Arc::clone(&self.shared), generation, events)));
        info!("Store started");
    }

    /// Installs an initially fetched snapshot unless one is already held.
    ///
    /// Returns true if `game` was installed. The snapshot is screened like
    /// any pushed one; a rejected snapshot is reported and not installed.
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    pub fn prime(&self, game: Game) -> bool {
        let mut installed = false;
        self.shared.update(|state| {
            if state.topic.is_none() || state.game.is_some() {
                debug!("Not priming: idle or a newer snapshot is held");
                return;
            }
            state.accept(game);
            installed = state.game.is_some();
        });
        installed
    }

    /// Stops following the game and clears everything held. Idempotent.
    pub fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.channel.close();
        self.shared.update(|state| {
            if state.topic.is_some() {
                info!("Store stopped");
            }
            state.generation += 1;
            state.clear();
        });
    }

    /// The held snapshot.
    pub fn current(&self) -> Option<Arc<Game>> {
        self.shared.lock().game.clone()
    }

    /// The latest published view.
    pub fn view(&self) -> Arc<StoreView> {
        Arc::clone(&self.shared.views.borrow())
    }

    /// Receiver of views; survives restarts.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreView>> {
        self.shared.views.subscribe()
    }

    /// Displayed-value receiver for clock `slot` (0 or 1).
    pub fn clock(&self, slot: usize) -> Option<watch::Receiver<i64>> {
        self.shared.lock().clocks.get(slot).map(ClockTicker::subscribe)
    }

    /// Currently displayed value of clock `slot`.
    pub fn clock_value(&self, slot: usize) -> Option<i64> {
        self.shared.lock().clocks.get(slot).map(ClockTicker::displayed)
    }

    /// Whether clock `slot` is currently counting down.
    pub fn clock_ticking(&self, slot: usize) -> Option<bool> {
        self.shared.lock().clocks.get(slot).map(ClockTicker::is_ticking)
    }

    /// Subscription health.
    pub fn connection(&self) -> ConnectionState {
        self.shared.lock().connection.clone()
    }

    /// Topic being followed.
    pub fn topic(&self) -> Option<Topic> {
        self.shared.lock().topic.clone()
    }
}

impl<T: PushTransport> Drop for GameStore<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump(shared: Arc<Shared>, generation: u64, mut events: EventStream) {
    while let Some(event) = events.recv().await {
        shared.handle(generation, event);
    }
    debug!("Event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, FakeTransport, ManualTime, snapshot};
    use crate::{ActionDispatcher, ActionError};
    use std::time::Duration;
    use strictly_mines::{GamePhase, StatusMessage};

    const T: i64 = 1_700_000_000_000;

    struct Harness {
        transport: Arc<FakeTransport>,
        time: Arc<ManualTime>,
        store: GameStore<FakeTransport>,
        views: watch::Receiver<Arc<StoreView>>,
    }

    impl Harness {
        fn new() -> Self {
            let transport = Arc::new(FakeTransport::default());
            let time = ManualTime::at(T);
            let store = GameStore::with_time_source(
                Arc::clone(&transport),
                &ClientConfig::default(),
                time.clone(),
            );
            let views = store.subscribe();
            Self {
                transport,
                time,
                store,
                views,
            }
        }

        async fn started(game: &str, local: &str) -> Self {
            let mut harness = Self::new();
            harness.store.start(GameId::new(game), PlayerId::new(local));
            harness.until(|v| *v.connection() == ConnectionState::Live).await;
            harness
        }

        async fn until(&mut self, mut ready: impl FnMut(&StoreView) -> bool) -> Arc<StoreView> {
            let view = tokio::time::timeout(
                Duration::from_secs(30),
                self.views.wait_for(|v| ready(v)),
            )
            .await
            .expect("view reached in time")
            .expect("store alive");
            Arc::clone(&view)
        }

        /// Publishes `json` and waits until the store has dealt with it.
        async fn deliver(&mut self, json: &str) -> Arc<StoreView> {
            let before = self.store.view();
            self.transport.publish(json);
            self.until(|v| {
                v.anomaly_count != before.anomaly_count
                    || match (&v.game, &before.game) {
                        (Some(now), Some(then)) => !Arc::ptr_eq(now, then),
                        (now, then) => now.is_some() != then.is_some(),
                    }
            })
            .await
        }
    }

    fn message(view: &StoreView) -> String {
        match view.status() {
            Some(Ok(status)) => status.message().to_string(),
            other => panic!("expected a status, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_is_last_delivered_snapshot() {
        let mut h = Harness::started("g1", "p-alice").await;
        assert!(h.store.current().is_none());

        h.deliver(&snapshot("g1", GamePhase::WaitingForPlayers).json()).await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForReady).json()).await;
        let last = snapshot("g1", GamePhase::WaitingForReady).ready(1);
        let view = h.deliver(&last.json()).await;

        let current = h.store.current().expect("snapshot held");
        assert_eq!(*current, last.game());
        assert!(Arc::ptr_eq(view.game().as_ref().expect("held"), &current));
        assert_eq!(message(&view), "Bob is ready. Press ready to start");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_move_leaves_state_unchanged() {
        let mut h = Harness::started("g1", "p-bob").await;
        h.deliver(&snapshot("g1", GamePhase::InProgress).json()).await;
        let before = h.store.current().expect("snapshot held");

        let api = Arc::new(FakeApi::default());
        api.reject_next(ActionError::from_status(403, "Forbidden"));
        let actions = ActionDispatcher::new(api, GameId::new("g1"), PlayerId::new("p-bob"));
        let err = actions.submit_move(1, 1).await.expect_err("not bob's turn");
        assert!(err.is_rule_rejection());

        let after = h.store.current().expect("snapshot held");
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(message(&h.store.view()), "Waiting on Alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_snapshot_is_rejected() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForPlayers).json()).await;
        let held = h.store.current().expect("snapshot held");

        let view = h.deliver(&snapshot("g2", GamePhase::WaitingForReady).json()).await;
        assert!(matches!(view.anomaly(), Some(ProtocolAnomaly::ForeignGame { .. })));
        assert!(Arc::ptr_eq(&held, &h.store.current().expect("still held")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_violations_are_rejected() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForReady).json()).await;

        let reshaped = h.deliver(&snapshot("g1", GamePhase::WaitingForReady).rows(4).json()).await;
        assert!(matches!(reshaped.anomaly(), Some(ProtocolAnomaly::InvariantViolated { .. })));

        let malformed = h.deliver("{\"id\":\"g1\",\"rows\":").await;
        assert!(matches!(malformed.anomaly(), Some(ProtocolAnomaly::MalformedSnapshot { .. })));

        assert_eq!(*h.store.view().anomaly_count(), 2);
        assert_eq!(
            *h.store.current().expect("held").phase(),
            GamePhase::WaitingForReady
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mine_count_mismatch_keeps_previous_view() {
        let mut h = Harness::started("g1", "p-alice").await;
        let held_view = h.deliver(&snapshot("g1", GamePhase::InProgress).json()).await;
        let held = h.store.current().expect("snapshot held");

        let view = h
            .deliver(&snapshot("g1", GamePhase::InProgress).mine(2, 2).json())
            .await;
        match view.anomaly() {
            Some(ProtocolAnomaly::InvariantViolated { game_id, violations }) => {
                assert_eq!(game_id, &GameId::new("g1"));
                assert_eq!(violations, &vec!["Exactly mine_count cells hold a mine".to_string()]);
            }
            other => panic!("expected an invariant violation, got {:?}", other),
        }
        assert!(Arc::ptr_eq(&held, &h.store.current().expect("still held")));
        assert_eq!(view.status(), held_view.status());
        assert_eq!(message(&view), "Your turn");
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_over_is_final() {
        let mut h = Harness::started("g1", "p-alice").await;
        let over = snapshot("g1", GamePhase::GameOver).winner(None);
        h.deliver(&over.json()).await;
        assert_eq!(message(&h.store.view()), "Game over: it's a draw");

        let view = h.deliver(&over.clone().score(0, 5).json()).await;
        assert!(matches!(
            view.anomaly(),
            Some(ProtocolAnomaly::MutationAfterGameOver { .. })
        ));
        assert_eq!(*h.store.current().expect("held"), over.game());
    }

    #[tokio::test(start_paused = true)]
    async fn test_regression_is_installed_and_reported() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::InProgress).json()).await;

        let view = h.deliver(&snapshot("g1", GamePhase::WaitingForReady).json()).await;
        assert!(matches!(view.anomaly(), Some(ProtocolAnomaly::PhaseRegression { .. })));
        assert_eq!(
            *h.store.current().expect("held").phase(),
            GamePhase::WaitingForReady
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_local_player_is_surfaced() {
        let mut h = Harness::started("g1", "p-carol").await;
        let view = h.deliver(&snapshot("g1", GamePhase::WaitingForReady).json()).await;

        assert!(view.game().is_some());
        assert!(matches!(
            view.status(),
            Some(Err(ProtocolAnomaly::LocalPlayerMissing { .. }))
        ));
        assert_eq!(*view.anomaly_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrative_precedence_through_store() {
        let mut h = Harness::started("g1", "p-alice").await;
        let view = h
            .deliver(
                &snapshot("g1", GamePhase::InProgress)
                    .reveal(1, 1, "p-alice")
                    .message("Alice revealed (1, 1)")
                    .json(),
            )
            .await;
        assert_eq!(message(&view), "Alice revealed (1, 1)");
        match view.status() {
            Some(Ok(status)) => assert_eq!(status.headline(), &StatusMessage::YourTurn),
            other => panic!("expected a status, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_state_follows_channel() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForPlayers).json()).await;

        h.transport.drop_connections("reset by peer");
        let view = h
            .until(|v| matches!(v.connection(), ConnectionState::Reconnecting { .. }))
            .await;
        assert!(view.game().is_some(), "snapshot kept while reconnecting");

        h.until(|v| *v.connection() == ConnectionState::Live).await;
        assert_eq!(h.transport.live_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prime_only_fills_empty_store() {
        let mut idle = Harness::new();
        assert!(!idle.store.prime(snapshot("g1", GamePhase::WaitingForPlayers).game()));

        let mut h = Harness::started("g1", "p-alice").await;
        assert!(h.store.prime(snapshot("g1", GamePhase::WaitingForPlayers).game()));

        h.deliver(&snapshot("g1", GamePhase::WaitingForReady).json()).await;
        assert!(!h.store.prime(snapshot("g1", GamePhase::WaitingForPlayers).game()));
        assert_eq!(
            *h.store.current().expect("held").phase(),
            GamePhase::WaitingForReady
        );
        idle.store.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clocks_follow_turn_and_freeze_at_game_over() {
        let mut h = Harness::started("g1", "p-alice").await;
        let mut alice_clock = h.store.clock(0).expect("slot 0");

        h.deliver(
            &snapshot("g1", GamePhase::InProgress)
                .turn("p-alice", T)
                .times(10_000, 20_000)
                .json(),
        )
        .await;
        assert_eq!(h.store.clock_value(0), Some(10_000));
        assert_eq!(h.store.clock_value(1), Some(20_000));

        h.time.set(T + 3_000);
        tokio::time::timeout(Duration::from_secs(1), alice_clock.wait_for(|v| *v == 7_000))
            .await
            .expect("ticked")
            .expect("alive");
        assert_eq!(h.store.clock_value(1), Some(20_000));

        h.deliver(
            &snapshot("g1", GamePhase::GameOver)
                .turn("p-alice", T)
                .times(6_500, 20_000)
                .winner(Some("p-bob"))
                .json(),
        )
        .await;
        h.time.set(T + 9_000);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.store.clock_value(0), Some(6_500));
        assert!(h.store.clock(2).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_restart_halt_running_clock() {
        for restart in [false, true] {
            let mut h = Harness::started("g1", "p-alice").await;
            h.deliver(
                &snapshot("g1", GamePhase::InProgress)
                    .turn("p-alice", T)
                    .times(10_000, 20_000)
                    .json(),
            )
            .await;
            assert_eq!(h.store.clock_ticking(0), Some(true));

            if restart {
                h.store.start(GameId::new("g2"), PlayerId::new("p-alice"));
                h.until(|v| *v.connection() == ConnectionState::Live).await;
            } else {
                h.store.stop();
            }
            assert_eq!(h.store.clock_ticking(0), Some(false));
            let shown = h.store.clock_value(0);

            h.time.set(T + 4_000);
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(h.store.clock_ticking(0), Some(false));
            assert_eq!(h.store.clock_value(0), shown);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_switches_games_cleanly() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForPlayers).json()).await;

        h.store.start(GameId::new("g2"), PlayerId::new("p-alice"));
        assert!(h.store.current().is_none());
        h.until(|v| *v.connection() == ConnectionState::Live).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let topics = h.transport.live_topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].game_id(), &GameId::new("g2"));

        h.deliver(&snapshot("g2", GamePhase::WaitingForPlayers).json()).await;
        assert_eq!(h.store.current().expect("held").id(), &GameId::new("g2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_and_releases() {
        let mut h = Harness::started("g1", "p-alice").await;
        h.deliver(&snapshot("g1", GamePhase::WaitingForPlayers).json()).await;

        h.store.stop();
        h.store.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.store.current().is_none());
        assert_eq!(h.store.connection(), ConnectionState::Idle);
        assert_eq!(h.transport.live_sessions(), 0);

        h.transport.publish(&snapshot("g1", GamePhase::WaitingForReady).json());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.store.current().is_none());
    }
}
