//! Snapshot types mirroring the server's game JSON.
//!
//! A [`Game`] is a complete, immutable picture of one match as the server
//! last broadcast it. The client never builds or edits one; it only
//! deserializes them and replaces the previous value wholesale.

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Opaque identifier of a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of a player, assigned by the server on join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Authoritative phase of a game.
///
/// Transitions only ever happen server-side:
/// `WaitingForPlayers -> WaitingForReady -> InProgress -> GameOver`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    /// Only one player has joined.
    WaitingForPlayers,
    /// Both players joined; waiting for both to mark ready.
    WaitingForReady,
    /// Moves are being played.
    InProgress,
    /// Terminal: no further changes.
    GameOver,
}

impl GamePhase {
    /// Position of the phase in the forward ordering.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::WaitingForPlayers => 0,
            Self::WaitingForReady => 1,
            Self::InProgress => 2,
            Self::GameOver => 3,
        }
    }

    /// Returns true if moving from `previous` to `self` goes backwards.
    pub fn regresses_from(self, previous: GamePhase) -> bool {
        self.ordinal() < previous.ordinal()
    }

    /// Returns true for the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

/// A participant as reported in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Server-assigned id.
    id: PlayerId,
    /// Display name chosen on join.
    username: String,
    /// Current score; penalties can push it below previous values.
    #[serde(default)]
    score: i32,
    /// Ready flag, meaningful only while waiting for ready.
    #[serde(default)]
    ready: bool,
}

/// One square of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Row index.
    row: usize,
    /// Column index.
    column: usize,
    /// Whether the square holds a mine.
    #[serde(default)]
    mine: bool,
    /// Whether the square has been opened.
    #[serde(default)]
    revealed: bool,
    /// Number of mines in the eight neighbours.
    #[serde(default)]
    adjacent_mines: u8,
    /// Player who opened the square.
    #[serde(rename = "revealedByPlayerId", default)]
    revealed_by: Option<PlayerId>,
    /// Player currently flagging the square.
    #[serde(rename = "flaggedByPlayerId", default)]
    flagged_by: Option<PlayerId>,
}

impl Cell {
    /// Returns true if some player has a flag on this square.
    pub fn is_flagged(&self) -> bool {
        self.flagged_by.is_some()
    }
}

const NO_MOVE: i32 = -1;

fn no_move() -> i32 {
    NO_MOVE
}

/// Complete server snapshot of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Game id.
    id: GameId,
    /// Row count.
    rows: usize,
    /// Column count.
    columns: usize,
    /// Number of mines on the board.
    mine_count: usize,
    /// Authoritative phase.
    #[serde(rename = "status")]
    phase: GamePhase,
    /// Ordered roster; index 0 is the first player and owns clock slot 0.
    #[serde(default)]
    players: Vec<Player>,
    /// Row-major grid of cells.
    #[serde(default)]
    board: Vec<Vec<Cell>>,
    /// Player to move, meaningful only while in progress.
    #[serde(rename = "currentTurn", default)]
    turn: Option<PlayerId>,
    /// Server timestamp (ms since epoch) at which the current turn began; 0 when none.
    #[serde(rename = "turnStartTimeMillis", default)]
    turn_start_ms: i64,
    /// Remaining budget of the first player at `turn_start_ms`.
    #[serde(rename = "player1TimeLeftMillis", default)]
    player1_time_left_ms: i64,
    /// Remaining budget of the second player at `turn_start_ms`.
    #[serde(rename = "player2TimeLeftMillis", default)]
    player2_time_left_ms: i64,
    /// Budget each player started with.
    #[serde(rename = "initialPlayerTimeMillis", default)]
    initial_time_ms: i64,
    /// Winner once the game is over; absent means a tie.
    #[serde(rename = "winnerId", default)]
    winner: Option<PlayerId>,
    #[serde(default)]
    #[getter(skip)]
    last_event_message: Option<String>,
    #[serde(default = "no_move")]
    #[getter(skip)]
    last_move_row: i32,
    #[serde(default = "no_move")]
    #[getter(skip)]
    last_move_col: i32,
}

impl Game {
    /// Looks up a player by id.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Returns the first roster entry that is not `id`.
    pub fn opponent_of(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id != id)
    }

    /// Clock slot (roster index) of a player.
    pub fn slot_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    /// The player whose turn it is, if the turn names a roster entry.
    pub fn turn_player(&self) -> Option<&Player> {
        self.turn.as_ref().and_then(|id| self.player(id))
    }

    /// The declared winner, if it names a roster entry.
    pub fn winner_player(&self) -> Option<&Player> {
        self.winner.as_ref().and_then(|id| self.player(id))
    }

    /// Returns the cell at a position.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.board.get(row).and_then(|r| r.get(column))
    }

    /// Iterates all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.board.iter().flatten()
    }

    /// Coordinates of the most recently applied move.
    pub fn last_move(&self) -> Option<(usize, usize)> {
        let row = usize::try_from(self.last_move_row).ok()?;
        let col = usize::try_from(self.last_move_col).ok()?;
        Some((row, col))
    }

    /// Server-authored narrative for the latest event; blank counts as absent.
    pub fn last_event_message(&self) -> Option<&str> {
        self.last_event_message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
    }

    /// Mines that have been opened so far.
    pub fn revealed_mine_count(&self) -> usize {
        self.cells().filter(|c| c.revealed && c.mine).count()
    }

    /// Mines still hidden on the board.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn remaining_mine_count(&self) -> usize {
        self.mine_count.saturating_sub(self.revealed_mine_count())
    }

    /// Time budget recorded for a clock slot.
    pub fn time_left(&self, slot: usize) -> Option<i64> {
        match slot {
            0 => Some(self.player1_time_left_ms),
            1 => Some(self.player2_time_left_ms),
            _ => None,
        }
    }

    /// Returns true once the game is over.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Returns true if both snapshots share the same geometry.
    pub fn same_geometry(&self, other: &Game) -> bool {
        self.rows == other.rows && self.columns == other.columns && self.mine_count == other.mine_count
    }
}
