//! Structural invariants every inbound snapshot must satisfy.
//!
//! Invariants are logical properties of a single [`Game`] value. They are
//! checked on receipt, before a snapshot is allowed to replace the one the
//! store holds.

mod board;
mod roster;
mod transition;

pub use board::{BoardGeometryInvariant, MineCountInvariant, RevealFlagExclusiveInvariant};
pub use roster::{RosterSizeInvariant, TurnHolderInvariant};
pub use transition::check_transition;

use crate::{Game, ProtocolAnomaly};
use tracing::{instrument, warn};

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set, collecting every violation.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

macro_rules! impl_invariant_set {
    ($($inv:ident),+) => {
        impl<S, $($inv),+> InvariantSet<S> for ($($inv,)+)
        where
            $($inv: Invariant<S>),+
        {
            fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
                let mut violations = Vec::new();
                $(
                    if !$inv::holds(state) {
                        violations.push(InvariantViolation::new($inv::description()));
                    }
                )+
                if violations.is_empty() {
                    Ok(())
                } else {
                    Err(violations)
                }
            }
        }
    };
}

impl_invariant_set!(I1, I2);
impl_invariant_set!(I1, I2, I3);
impl_invariant_set!(I1, I2, I3, I4, I5);

/// Every structural invariant a snapshot must satisfy.
pub type SnapshotInvariants = (
    BoardGeometryInvariant,
    MineCountInvariant,
    RevealFlagExclusiveInvariant,
    RosterSizeInvariant,
    TurnHolderInvariant,
);

/// Validates a single snapshot against [`SnapshotInvariants`].
#[instrument(skip(game), fields(game_id = %game.id(), phase = %game.phase()))]
pub fn validate_snapshot(game: &Game) -> Result<(), ProtocolAnomaly> {
    <SnapshotInvariants as InvariantSet<Game>>::check_all(game).map_err(|violations| {
        let violations: Vec<String> = violations.into_iter().map(|v| v.description).collect();
        warn!(?violations, "Snapshot failed structural validation");
        ProtocolAnomaly::InvariantViolated {
            game_id: game.id().clone(),
            violations,
        }
    })
}
