//! Countdown reconstruction between discrete server updates.
//!
//! The server only reports each player's remaining budget at the moment the
//! current turn started. Everything in between is interpolated here from a
//! [`ClockAnchor`] and the current wall-clock time.

use crate::{Game, GamePhase};
use derive_getters::Getters;

/// Remaining time under which a clock is shown as running low.
pub const LOW_TIME_MS: i64 = 10_000;

/// Authoritative reference point for one player's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters)]
pub struct ClockAnchor {
    /// Budget left at `turn_start_ms`.
    time_left_ms: i64,
    /// Server timestamp (ms since epoch) the turn began; non-positive means none.
    turn_start_ms: i64,
    /// Whether this clock is the one counting down.
    active: bool,
}

impl ClockAnchor {
    /// Creates an anchor.
    pub fn new(time_left_ms: i64, turn_start_ms: i64, active: bool) -> Self {
        Self {
            time_left_ms,
            turn_start_ms,
            active,
        }
    }

    /// A clock that shows `time_left_ms` and never moves.
    pub fn frozen(time_left_ms: i64) -> Self {
        Self::new(time_left_ms, 0, false)
    }

    /// Returns true if the displayed value should decrease over time.
    pub fn is_running(&self) -> bool {
        self.active && self.time_left_ms > 0 && self.turn_start_ms > 0
    }

    /// Displayed remaining time at `now_ms`.
    ///
    /// A running clock never shows more than its anchor value, even when
    /// `now_ms` is behind the server's turn start, and never goes below 0.
    /// A stopped clock shows its anchor value verbatim.
    pub fn sample(&self, now_ms: i64) -> i64 {
        if !self.is_running() {
            return self.time_left_ms;
        }
        let elapsed = now_ms.saturating_sub(self.turn_start_ms).max(0);
        self.time_left_ms.saturating_sub(elapsed).max(0)
    }
}

/// Anchors for both clock slots of a snapshot.
///
/// Slot `i` belongs to roster entry `i`. Only the slot holding the turn in
/// an in-progress game is active, and only it receives the turn start.
pub fn clock_anchors(game: &Game) -> [ClockAnchor; 2] {
    let in_progress = *game.phase() == GamePhase::InProgress;
    std::array::from_fn(|slot| {
        let time_left = game.time_left(slot).unwrap_or_default();
        let holds_turn = game
            .players()
            .get(slot)
            .is_some_and(|p| game.turn().as_ref() == Some(p.id()));
        if in_progress && holds_turn {
            ClockAnchor::new(time_left, *game.turn_start_ms(), true)
        } else {
            ClockAnchor::frozen(time_left)
        }
    })
}

/// Renders milliseconds as seconds with three decimals, clamped at zero.
pub fn format_clock(ms: i64) -> String {
    if ms <= 0 {
        return "0.000".to_string();
    }
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Returns true when a clock is running low but not yet expired.
pub fn is_low_time(ms: i64) -> bool {
    ms > 0 && ms <= LOW_TIME_MS
}
