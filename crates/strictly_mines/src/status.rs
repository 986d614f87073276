//! Status derivation: everything a view shows about "what is going on",
//! computed purely from a snapshot and the local player's id.

use crate::{Game, GamePhase, Player, PlayerId, ProtocolAnomaly};
use derive_getters::Getters;
use tracing::{instrument, warn};

const OPPONENT: &str = "opponent";

/// Human-facing status line.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum StatusMessage {
    /// Server-authored narrative, shown verbatim.
    #[display("{_0}")]
    Narrative(String),
    /// The game ended with a winner.
    #[display("Game over! Winner: {_0}")]
    Winner(String),
    /// The game ended without a winner.
    #[display("Game over: it's a draw")]
    Draw,
    /// The game ended but the winner is unknown to the roster.
    #[display("Game over")]
    GameOver,
    /// Only one player has joined.
    #[display("Waiting for opponent")]
    WaitingForOpponent,
    /// Nobody is ready yet.
    #[display("Press ready to start")]
    ReadyPrompt,
    /// The opponent is ready, the local player is not.
    #[display("{_0} is ready. Press ready to start")]
    OpponentReady(String),
    /// The local player is ready, the opponent is not.
    #[display("You're ready. Waiting for {_0} to get ready")]
    AwaitingOpponentReady(String),
    /// Both ready; the server is about to start play.
    #[display("Game starting")]
    Starting,
    /// The local player should move.
    #[display("Your turn")]
    YourTurn,
    /// The named player should move.
    #[display("Waiting on {_0}")]
    WaitingOn(String),
}

/// Result of a finished game from the local player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LocalOutcome {
    /// The local player won.
    Won,
    /// The opponent won.
    Lost,
    /// Nobody won.
    Tie,
}

/// Derived view data for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct StatusView {
    /// Status line after narrative precedence.
    message: StatusMessage,
    /// Phase-derived line, ignoring any narrative.
    headline: StatusMessage,
    /// Phase of the snapshot.
    phase: GamePhase,
    /// The local player's clock slot.
    local_slot: usize,
    /// The local player holds the turn.
    is_my_turn: bool,
    /// Revealing a cell is worth attempting (advisory).
    can_reveal: bool,
    /// Toggling a flag is worth attempting (advisory).
    can_flag: bool,
    /// The ready action is worth offering (advisory).
    can_ready: bool,
    /// The board should be shown as non-interactive.
    board_locked: bool,
    /// Local outcome once the game is over.
    outcome: Option<LocalOutcome>,
    /// Mines not yet revealed.
    remaining_mines: usize,
}

/// Derives the status view of `game` for the local player.
///
/// Fails with [`ProtocolAnomaly::LocalPlayerMissing`] instead of guessing
/// when the local player is not in the roster.
#[instrument(skip(game), fields(game_id = %game.id(), phase = %game.phase(), local = %local_id))]
pub fn derive_status(game: &Game, local_id: &PlayerId) -> Result<StatusView, ProtocolAnomaly> {
    let Some(local) = game.player(local_id) else {
        warn!("Local player missing from roster");
        return Err(ProtocolAnomaly::LocalPlayerMissing {
            game_id: game.id().clone(),
            player_id: local_id.clone(),
        });
    };
    let local_slot = game.slot_of(local_id).unwrap_or_default();

    let headline = phase_message(game, local);
    let message = match game.last_event_message() {
        Some(narrative) => StatusMessage::Narrative(narrative.to_string()),
        None => headline.clone(),
    };

    let phase = *game.phase();
    let in_progress = phase == GamePhase::InProgress;
    let is_my_turn = in_progress && game.turn().as_ref() == Some(local_id);

    Ok(StatusView {
        message,
        headline,
        phase,
        local_slot,
        is_my_turn,
        can_reveal: is_my_turn,
        can_flag: in_progress,
        can_ready: phase == GamePhase::WaitingForReady && !*local.ready(),
        board_locked: !in_progress,
        outcome: local_outcome(game, local_id),
        remaining_mines: game.remaining_mine_count(),
    })
}

fn phase_message(game: &Game, local: &Player) -> StatusMessage {
    match game.phase() {
        GamePhase::GameOver => match (game.winner(), game.winner_player()) {
            (None, _) => StatusMessage::Draw,
            (Some(_), Some(winner)) => StatusMessage::Winner(winner.username().clone()),
            (Some(_), None) => StatusMessage::GameOver,
        },
        GamePhase::WaitingForPlayers => StatusMessage::WaitingForOpponent,
        GamePhase::WaitingForReady => {
            let other = game.opponent_of(local.id());
            let other_ready = other.is_some_and(|p| *p.ready());
            let other_name = other.map_or(OPPONENT, |p| p.username().as_str()).to_string();
            match (*local.ready(), other_ready) {
                (false, false) => StatusMessage::ReadyPrompt,
                (false, true) => StatusMessage::OpponentReady(other_name),
                (true, false) => StatusMessage::AwaitingOpponentReady(other_name),
                (true, true) => StatusMessage::Starting,
            }
        }
        GamePhase::InProgress => {
            if game.turn().as_ref() == Some(local.id()) {
                StatusMessage::YourTurn
            } else {
                let name = game
                    .turn_player()
                    .or_else(|| game.opponent_of(local.id()))
                    .map_or(OPPONENT, |p| p.username().as_str());
                StatusMessage::WaitingOn(name.to_string())
            }
        }
    }
}

fn local_outcome(game: &Game, local_id: &PlayerId) -> Option<LocalOutcome> {
    if !game.is_terminal() {
        return None;
    }
    Some(match game.winner() {
        None => LocalOutcome::Tie,
        Some(winner) if winner == local_id => LocalOutcome::Won,
        Some(_) => LocalOutcome::Lost,
    })
}
