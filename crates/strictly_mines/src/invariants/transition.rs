//! Checks between two consecutive snapshots of the same subscription.

use crate::{Game, ProtocolAnomaly};
use tracing::{instrument, warn};

/// Compares a new snapshot with the one it would replace.
///
/// Order matters: identity and geometry first, then the terminal rule, then
/// phase ordering. A snapshot identical to a terminal one is accepted.
#[instrument(skip(previous, next), fields(game_id = %previous.id(), from = %previous.phase(), to = %next.phase()))]
pub fn check_transition(previous: &Game, next: &Game) -> Result<(), ProtocolAnomaly> {
    if previous.id() != next.id() {
        warn!(received = %next.id(), "Snapshot for another game");
        return Err(ProtocolAnomaly::ForeignGame {
            expected: previous.id().clone(),
            received: next.id().clone(),
        });
    }

    if !previous.same_geometry(next) {
        warn!("Board geometry changed");
        return Err(ProtocolAnomaly::GeometryChanged {
            game_id: next.id().clone(),
        });
    }

    if previous.is_terminal() {
        if previous == next {
            return Ok(());
        }
        warn!("Snapshot changed after game over");
        return Err(ProtocolAnomaly::MutationAfterGameOver {
            game_id: next.id().clone(),
        });
    }

    if next.phase().regresses_from(*previous.phase()) {
        warn!("Phase regression");
        return Err(ProtocolAnomaly::PhaseRegression {
            game_id: next.id().clone(),
            from: *previous.phase(),
            to: *next.phase(),
        });
    }

    Ok(())
}
