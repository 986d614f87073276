//! Strictly Mines - game-sync logic for two-player competitive minesweeper
//!
//! The server owns the rules and broadcasts a complete [`Game`] snapshot
//! after every change. This crate holds everything a client derives from
//! those snapshots without doing any I/O.
//!
//! # Architecture
//!
//! - **Types**: the snapshot model (`Game`, `Player`, `Cell`, `GamePhase`)
//! - **Invariants**: structural checks on a snapshot and between snapshots
//! - **Status**: phase-specific status line and interaction flags
//! - **Clock**: countdown reconstruction from a turn-start anchor
//! - **Difficulty**: board presets for creating games
//!
//! # Example
//!
//! ```
//! use strictly_mines::{ClockAnchor, format_clock};
//!
//! let anchor = ClockAnchor::new(10_000, 1_000, true);
//! assert_eq!(format_clock(anchor.sample(4_000)), "7.000");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod anomaly;
mod clock;
mod difficulty;
pub mod invariants;
mod status;
mod types;

pub use anomaly::ProtocolAnomaly;
pub use clock::{ClockAnchor, LOW_TIME_MS, clock_anchors, format_clock, is_low_time};
pub use difficulty::{BoardConfig, BoardConfigError, CUSTOM_TIME_BUDGET_MS, Difficulty};
pub use invariants::{check_transition, validate_snapshot};
pub use status::{LocalOutcome, StatusMessage, StatusView, derive_status};
pub use types::{Cell, Game, GameId, GamePhase, Player, PlayerId};
