//! Difficulty presets and board configuration for new games.

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::instrument;

/// Fallback turn budget for board sizes without a preset.
pub const CUSTOM_TIME_BUDGET_MS: i64 = 90_000;

/// Named board presets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    /// 8x8, 10 mines.
    Easy,
    /// 16x16, 40 mines.
    Medium,
    /// 16x20, 60 mines.
    Hard,
    /// 20x24, 99 mines.
    Expert,
}

impl Difficulty {
    /// Board configuration of the preset.
    pub fn board(self) -> BoardConfig {
        match self {
            Self::Easy => BoardConfig::new(8, 8, 10),
            Self::Medium => BoardConfig::new(16, 16, 40),
            Self::Hard => BoardConfig::new(16, 20, 60),
            Self::Expert => BoardConfig::new(20, 24, 99),
        }
    }

    /// Per-player time budget the server grants for this preset.
    pub fn time_budget_ms(self) -> i64 {
        match self {
            Self::Easy => 30_000,
            Self::Medium => 90_000,
            Self::Hard => 105_000,
            Self::Expert => 150_000,
        }
    }
}

/// Error for a board that cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum BoardConfigError {
    /// Zero rows or columns.
    #[display("Board must have at least one row and one column")]
    EmptyBoard,
    /// Not enough room for the mines plus one safe cell.
    #[display("{mines} mines do not fit on a board of {cells} cells")]
    TooManyMines {
        /// Requested mines.
        mines: usize,
        /// Cells on the board.
        cells: usize,
    },
    /// The cell count does not fit in a `usize`.
    #[display("A {rows}x{columns} board is too large")]
    TooLarge {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        columns: usize,
    },
}

impl std::error::Error for BoardConfigError {}

/// Geometry of a game to create; serializes as the create-game request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Row count.
    rows: usize,
    /// Column count.
    columns: usize,
    /// Mine count.
    mine_count: usize,
}

impl BoardConfig {
    /// Creates a configuration without validating it.
    pub fn new(rows: usize, columns: usize, mine_count: usize) -> Self {
        Self {
            rows,
            columns,
            mine_count,
        }
    }

    /// Checks the configuration can produce a playable board.
    #[instrument]
    pub fn validate(&self) -> Result<(), BoardConfigError> {
        let cells = self
            .rows
            .checked_mul(self.columns)
            .ok_or(BoardConfigError::TooLarge {
                rows: self.rows,
                columns: self.columns,
            })?;
        if cells == 0 {
            return Err(BoardConfigError::EmptyBoard);
        }
        if self.mine_count >= cells {
            return Err(BoardConfigError::TooManyMines {
                mines: self.mine_count,
                cells,
            });
        }
        Ok(())
    }

    /// The preset this configuration matches, if any.
    pub fn preset(&self) -> Option<Difficulty> {
        Difficulty::iter().find(|d| d.board() == *self)
    }

    /// Per-player time budget the server grants for this board.
    pub fn time_budget_ms(&self) -> i64 {
        self.preset()
            .map_or(CUSTOM_TIME_BUDGET_MS, Difficulty::time_budget_ms)
    }
}

impl From<Difficulty> for BoardConfig {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.board()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_presets_round_trip_to_budget() {
        assert_eq!(BoardConfig::new(8, 8, 10).preset(), Some(Difficulty::Easy));
        assert_eq!(BoardConfig::from(Difficulty::Expert).time_budget_ms(), 150_000);
        assert_eq!(BoardConfig::new(5, 5, 3).time_budget_ms(), CUSTOM_TIME_BUDGET_MS);
    }

    #[test]
    fn test_validate() {
        assert!(Difficulty::Hard.board().validate().is_ok());
        assert_eq!(BoardConfig::new(0, 4, 1).validate(), Err(BoardConfigError::EmptyBoard));
        assert!(matches!(
            BoardConfig::new(2, 2, 4).validate(),
            Err(BoardConfigError::TooManyMines { mines: 4, cells: 4 })
        ));
    }

    #[test]
    fn test_validate_rejects_overflowing_board() {
        let rows = usize::MAX / 2;
        assert_eq!(
            BoardConfig::new(rows, 4, 1).validate(),
            Err(BoardConfigError::TooLarge { rows, columns: 4 })
        );
        assert!(BoardConfig::new(usize::MAX, usize::MAX, 0).validate().is_err());
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(Difficulty::from_str("medium").ok(), Some(Difficulty::Medium));
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(Difficulty::Easy.board()).expect("serializable");
        assert_eq!(body, serde_json::json!({"rows": 8, "columns": 8, "mineCount": 10}));
    }
}
