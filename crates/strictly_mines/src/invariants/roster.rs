//! Roster invariants: at most two players, and the turn names one of them.

use super::Invariant;
use crate::{Game, GamePhase};

/// Invariant: a game never has more than two players.
pub struct RosterSizeInvariant;

impl Invariant<Game> for RosterSizeInvariant {
    fn holds(game: &Game) -> bool {
        game.players().len() <= 2
    }

    fn description() -> &'static str {
        "At most two players are in the roster"
    }
}

/// Invariant: while in progress, the turn belongs to a current player.
pub struct TurnHolderInvariant;

impl Invariant<Game> for TurnHolderInvariant {
    fn holds(game: &Game) -> bool {
        *game.phase() != GamePhase::InProgress || game.turn_player().is_some()
    }

    fn description() -> &'static str {
        "While in progress the turn names a current player"
    }
}
