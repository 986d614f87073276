//! In-memory fakes and snapshot builders shared by the unit tests.

use crate::{ActionError, GameApi, PushSession, PushTransport, TimeSource, Topic, TransportError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strictly_mines::{BoardConfig, Game, GameId, GamePhase, PlayerId};
use tokio::sync::mpsc;

/// Server-side JSON for a 3x3 game with one mine at (0, 0).
///
/// Alice is always present; Bob joins from `WAITING_FOR_READY` on. In
/// progress, Alice holds the turn.
#[derive(Clone)]
pub(crate) struct SnapshotBuilder {
    value: Value,
}

pub(crate) fn snapshot(id: &str, phase: GamePhase) -> SnapshotBuilder {
    let board: Vec<Vec<Value>> = (0..3)
        .map(|row| {
            (0..3)
                .map(|column| {
                    json!({
                        "row": row,
                        "column": column,
                        "mine": row == 0 && column == 0,
                        "revealed": false,
                        "adjacentMines": u8::from((row, column) != (0, 0) && row <= 1 && column <= 1),
                    })
                })
                .collect()
        })
        .collect();

    let mut players = vec![json!({ "id": "p-alice", "username": "Alice", "score": 0, "ready": false })];
    if phase != GamePhase::WaitingForPlayers {
        players.push(json!({ "id": "p-bob", "username": "Bob", "score": 0, "ready": false }));
    }
    let turn = if phase == GamePhase::InProgress {
        json!("p-alice")
    } else {
        Value::Null
    };

    SnapshotBuilder {
        value: json!({
            "id": id,
            "rows": 3,
            "columns": 3,
            "mineCount": 1,
            "status": phase,
            "players": players,
            "board": board,
            "currentTurn": turn,
            "turnStartTimeMillis": 0,
            "player1TimeLeftMillis": 30_000,
            "player2TimeLeftMillis": 30_000,
            "initialPlayerTimeMillis": 30_000,
            "winnerId": null,
            "lastEventMessage": "",
            "lastMoveRow": -1,
            "lastMoveCol": -1,
            "gameOver": phase == GamePhase::GameOver,
        }),
    }
}

pub(crate) fn snapshot_json(id: &str, phase: GamePhase) -> String {
    snapshot(id, phase).json()
}

impl SnapshotBuilder {
    pub(crate) fn turn(mut self, player: &str, start_ms: i64) -> Self {
        self.value["currentTurn"] = json!(player);
        self.value["turnStartTimeMillis"] = json!(start_ms);
        self
    }

    pub(crate) fn times(mut self, first: i64, second: i64) -> Self {
        self.value["player1TimeLeftMillis"] = json!(first);
        self.value["player2TimeLeftMillis"] = json!(second);
        self
    }

    pub(crate) fn score(mut self, slot: usize, score: i32) -> Self {
        self.value["players"][slot]["score"] = json!(score);
        self
    }

    pub(crate) fn ready(mut self, slot: usize) -> Self {
        self.value["players"][slot]["ready"] = json!(true);
        self
    }

    pub(crate) fn winner(mut self, player: Option<&str>) -> Self {
        self.value["winnerId"] = json!(player);
        self
    }

    pub(crate) fn message(mut self, message: &str) -> Self {
        self.value["lastEventMessage"] = json!(message);
        self
    }

    pub(crate) fn reveal(mut self, row: usize, column: usize, by: &str) -> Self {
        let cell = &mut self.value["board"][row][column];
        cell["revealed"] = json!(true);
        cell["revealedByPlayerId"] = json!(by);
        self.value["lastMoveRow"] = json!(row);
        self.value["lastMoveCol"] = json!(column);
        self
    }

    /// Hides an extra mine without touching `mineCount`.
    pub(crate) fn mine(mut self, row: usize, column: usize) -> Self {
        self.value["board"][row][column]["mine"] = json!(true);
        self
    }

    pub(crate) fn rows(mut self, rows: usize) -> Self {
        self.value["rows"] = json!(rows);
        self
    }

    pub(crate) fn json(&self) -> String {
        self.value.to_string()
    }

    pub(crate) fn game(&self) -> Game {
        serde_json::from_value(self.value.clone()).expect("builder produces a valid game")
    }
}

/// Records every call and answers from a fixed game list.
#[derive(Default)]
pub(crate) struct FakeApi {
    calls: Mutex<Vec<String>>,
    games: Mutex<Vec<Game>>,
    rejections: Mutex<VecDeque<ActionError>>,
}

impl FakeApi {
    pub(crate) fn with_games(games: Vec<Game>) -> Self {
        Self {
            games: Mutex::new(games),
            ..Self::default()
        }
    }

    /// Makes the next call fail with `error`.
    pub(crate) fn reject_next(&self, error: ActionError) {
        self.rejections.lock().expect("lock").push_back(error);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) -> Result<(), ActionError> {
        self.calls.lock().expect("lock").push(call);
        match self.rejections.lock().expect("lock").pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find(&self, game_id: &GameId) -> Result<Game, ActionError> {
        self.games
            .lock()
            .expect("lock")
            .iter()
            .find(|g| g.id() == game_id)
            .cloned()
            .ok_or_else(|| ActionError::from_status(404, "Not Found"))
    }
}

#[async_trait]
impl GameApi for FakeApi {
    async fn create_game(&self, board: &BoardConfig) -> Result<Game, ActionError> {
        self.record(format!("create {}x{} {}", board.rows(), board.columns(), board.mine_count()))?;
        self.games
            .lock()
            .expect("lock")
            .first()
            .cloned()
            .ok_or_else(|| ActionError::from_status(500, "no game"))
    }

    async fn get_game(&self, game_id: &GameId) -> Result<Game, ActionError> {
        self.record(format!("get {game_id}"))?;
        self.find(game_id)
    }

    async fn list_games(&self) -> Result<Vec<Game>, ActionError> {
        self.record("list".to_string())?;
        Ok(self.games.lock().expect("lock").clone())
    }

    async fn join_game(&self, game_id: &GameId, username: &str) -> Result<Game, ActionError> {
        self.record(format!("join {game_id} {username}"))?;
        self.find(game_id)
    }

    async fn make_move(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError> {
        self.record(format!("move {game_id} {player_id} {row} {col}"))
    }

    async fn toggle_flag(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError> {
        self.record(format!("flag {game_id} {player_id} {row} {col}"))
    }

    async fn mark_ready(&self, game_id: &GameId, player_id: &PlayerId) -> Result<(), ActionError> {
        self.record(format!("ready {game_id} {player_id}"))
    }
}

type Feed = mpsc::UnboundedSender<Result<String, TransportError>>;

struct SessionHandle {
    topic: Topic,
    feed: Feed,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.feed.is_closed()
    }
}

/// Hands out sessions fed by [`FakeTransport::publish`].
#[derive(Default)]
pub(crate) struct FakeTransport {
    sessions: Mutex<Vec<SessionHandle>>,
    failures: Mutex<VecDeque<String>>,
    attempts: AtomicUsize,
}

impl FakeTransport {
    /// Makes the next `connect` call fail with `reason`.
    pub(crate) fn fail_next_connect(&self, reason: &str) {
        self.failures
            .lock()
            .expect("lock")
            .push_back(reason.to_string());
    }

    /// Delivers `payload` to every live session.
    pub(crate) fn publish(&self, payload: &str) {
        for session in self.sessions.lock().expect("lock").iter() {
            if session.is_live() {
                let _ = session.feed.send(Ok(payload.to_string()));
            }
        }
    }

    /// Breaks every live session with `reason`.
    pub(crate) fn drop_connections(&self, reason: &str) {
        for session in self.sessions.lock().expect("lock").iter() {
            if session.is_live() {
                let _ = session.feed.send(Err(TransportError::new(reason)));
            }
        }
    }

    /// Sessions neither closed by the client nor dropped.
    pub(crate) fn live_sessions(&self) -> usize {
        self.sessions
            .lock()
            .expect("lock")
            .iter()
            .filter(|s| s.is_live())
            .count()
    }

    /// Topics of the live sessions.
    pub(crate) fn live_topics(&self) -> Vec<Topic> {
        self.sessions
            .lock()
            .expect("lock")
            .iter()
            .filter(|s| s.is_live())
            .map(|s| s.topic.clone())
            .collect()
    }

    /// Total connect calls, failed ones included.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self, topic: &Topic) -> Result<Box<dyn PushSession>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failures.lock().expect("lock").pop_front() {
            return Err(TransportError::new(reason));
        }
        let (feed, payloads) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        self.sessions.lock().expect("lock").push(SessionHandle {
            topic: topic.clone(),
            feed,
            closed: Arc::clone(&closed),
        });
        Ok(Box::new(FakeSession { payloads, closed }))
    }
}

struct FakeSession {
    payloads: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PushSession for FakeSession {
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>> {
        match self.payloads.recv().await? {
            Ok(payload) => Some(Ok(payload)),
            Err(e) => {
                self.closed.store(true, Ordering::SeqCst);
                Some(Err(e))
            }
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Wall clock that only moves when told to.
pub(crate) struct ManualTime(AtomicI64);

impl ManualTime {
    pub(crate) fn at(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }

    pub(crate) fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
