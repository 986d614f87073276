//! Board invariants: fixed geometry, exact mine count, flag/reveal exclusion.

use super::Invariant;
use crate::Game;

/// Invariant: the grid is `rows x columns` and every cell sits at its own coordinates.
pub struct BoardGeometryInvariant;

impl Invariant<Game> for BoardGeometryInvariant {
    fn holds(game: &Game) -> bool {
        if game.board().len() != *game.rows() {
            return false;
        }
        game.board().iter().enumerate().all(|(r, row)| {
            row.len() == *game.columns()
                && row
                    .iter()
                    .enumerate()
                    .all(|(c, cell)| *cell.row() == r && *cell.column() == c)
        })
    }

    fn description() -> &'static str {
        "Board dimensions match rows x columns and cell coordinates match their position"
    }
}

/// Invariant: exactly `mine_count` cells hold a mine.
pub struct MineCountInvariant;

impl Invariant<Game> for MineCountInvariant {
    fn holds(game: &Game) -> bool {
        game.cells().filter(|c| *c.mine()).count() == *game.mine_count()
    }

    fn description() -> &'static str {
        "Exactly mine_count cells hold a mine"
    }
}

/// Invariant: no cell is both revealed and flagged.
pub struct RevealFlagExclusiveInvariant;

impl Invariant<Game> for RevealFlagExclusiveInvariant {
    fn holds(game: &Game) -> bool {
        !game.cells().any(|c| *c.revealed() && c.is_flagged())
    }

    fn description() -> &'static str {
        "A cell is never both revealed and flagged"
    }
}
