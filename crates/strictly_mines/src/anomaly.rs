//! Protocol anomalies: server data that breaks the snapshot contract.
//!
//! These are never coerced into a valid-looking state. Callers decide
//! whether to log, alert or show them, separately from transient
//! connection trouble.

use crate::{GameId, GamePhase, PlayerId};

/// A snapshot, or a pair of consecutive snapshots, that violates the protocol.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ProtocolAnomaly {
    /// The payload could not be decoded as a game snapshot.
    #[display("Malformed snapshot: {reason}")]
    MalformedSnapshot {
        /// Decoder error text.
        reason: String,
    },

    /// The snapshot decoded but breaks structural invariants.
    #[display("Snapshot for game {game_id} violates invariants: {}", violations.join("; "))]
    InvariantViolated {
        /// Game the snapshot claims to describe.
        game_id: GameId,
        /// Descriptions of each violated invariant.
        violations: Vec<String>,
    },

    /// A snapshot for a different game arrived on this game's topic.
    #[display("Expected snapshot for game {expected}, received {received}")]
    ForeignGame {
        /// Game the subscription is for.
        expected: GameId,
        /// Game the snapshot describes.
        received: GameId,
    },

    /// Board geometry changed after creation.
    #[display("Board geometry of game {game_id} changed between snapshots")]
    GeometryChanged {
        /// Affected game.
        game_id: GameId,
    },

    /// The phase moved backwards.
    #[display("Game {game_id} regressed from {from} to {to}")]
    PhaseRegression {
        /// Affected game.
        game_id: GameId,
        /// Phase of the previous snapshot.
        from: GamePhase,
        /// Phase of the new snapshot.
        to: GamePhase,
    },

    /// A differing snapshot arrived after the game was already over.
    #[display("Game {game_id} changed after it was over")]
    MutationAfterGameOver {
        /// Affected game.
        game_id: GameId,
    },

    /// The local player is not part of the roster.
    #[display("Player {player_id} is not in the roster of game {game_id}")]
    LocalPlayerMissing {
        /// Affected game.
        game_id: GameId,
        /// The local player's id.
        player_id: PlayerId,
    },
}

impl ProtocolAnomaly {
    /// Returns true if the offending snapshot must not replace the held one.
    ///
    /// Structural breakage is rejected. Semantic oddities (a phase
    /// regression, a missing local player) are installed as delivered and
    /// only reported.
    pub fn rejects_snapshot(&self) -> bool {
        match self {
            Self::MalformedSnapshot { .. }
            | Self::InvariantViolated { .. }
            | Self::ForeignGame { .. }
            | Self::GeometryChanged { .. }
            | Self::MutationAfterGameOver { .. } => true,
            Self::PhaseRegression { .. } | Self::LocalPlayerMissing { .. } => false,
        }
    }
}

impl std::error::Error for ProtocolAnomaly {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_violations() {
        let anomaly = ProtocolAnomaly::InvariantViolated {
            game_id: GameId::new("g"),
            violations: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            anomaly.to_string(),
            "Snapshot for game g violates invariants: a; b"
        );
        assert!(anomaly.rejects_snapshot());
    }

    #[test]
    fn test_regression_is_reported_not_rejected() {
        let anomaly = ProtocolAnomaly::PhaseRegression {
            game_id: GameId::new("g"),
            from: GamePhase::InProgress,
            to: GamePhase::WaitingForReady,
        };
        assert!(!anomaly.rejects_snapshot());
        assert_eq!(
            anomaly.to_string(),
            "Game g regressed from IN_PROGRESS to WAITING_FOR_READY"
        );
    }
}
