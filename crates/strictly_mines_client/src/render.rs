//! Plain-text rendering of a game for terminals.

use crate::StoreView;
use strictly_mines::{Cell, Game, LocalOutcome, PlayerId, format_clock, is_low_time};

/// Glyph for one cell as seen by `local`.
///
/// `F` is the local player's flag, `f` the opponent's. Hidden cells are
/// `#`, revealed mines `*`, empty revealed cells `.`.
pub fn cell_glyph(cell: &Cell, local: &PlayerId) -> char {
    if *cell.revealed() {
        if *cell.mine() {
            return '*';
        }
        return match *cell.adjacent_mines() {
            0 => '.',
            n => char::from_digit(u32::from(n), 10).unwrap_or('?'),
        };
    }
    match cell.flagged_by() {
        Some(owner) if owner == local => 'F',
        Some(_) => 'f',
        None => '#',
    }
}

/// The board with row and column indices. The last move is marked with `>`.
pub fn board(game: &Game, local: &PlayerId) -> String {
    let last = game.last_move();
    let mut out = String::from("   ");
    for column in 0..*game.columns() {
        out.push_str(&format!("{:>2}", column % 100));
    }
    out.push('\n');
    for (r, row) in game.board().iter().enumerate() {
        out.push_str(&format!("{:>3}", r));
        for (c, cell) in row.iter().enumerate() {
            out.push(if last == Some((r, c)) { '>' } else { ' ' });
            out.push(cell_glyph(cell, local));
        }
        out.push('\n');
    }
    out
}

/// One line per player: name, score and clock, low clocks marked with `!`.
pub fn scoreboard(game: &Game, clocks: [i64; 2], local: &PlayerId) -> String {
    game.players()
        .iter()
        .zip(clocks)
        .map(|(player, clock)| {
            let you = if player.id() == local { " (you)" } else { "" };
            let turn = if game.turn().as_ref() == Some(player.id()) { "*" } else { " " };
            let low = if is_low_time(clock) { "!" } else { "" };
            format!(
                "{turn} {}{you}: {} pts, {}s{low}",
                player.username(),
                player.score(),
                format_clock(clock)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Status line of a view, falling back to the anomaly when status failed.
pub fn status_line(view: &StoreView) -> String {
    match view.status() {
        Some(Ok(status)) => match status.outcome() {
            Some(LocalOutcome::Won) => format!("{} (you won)", status.message()),
            Some(LocalOutcome::Lost) => format!("{} (you lost)", status.message()),
            Some(LocalOutcome::Tie) | None => status.message().to_string(),
        },
        Some(Err(anomaly)) => format!("Cannot show status: {}", anomaly),
        None => "Waiting for the first snapshot".to_string(),
    }
}

/// Full text screen: connection, status, scoreboard, mines left and board.
pub fn screen(view: &StoreView, clocks: [i64; 2], local: &PlayerId) -> String {
    let mut out = format!("[{}] {}\n", view.connection(), status_line(view));
    if let Some(anomaly) = view.anomaly() {
        out.push_str(&format!("! {}\n", anomaly));
    }
    if let Some(game) = view.game() {
        out.push_str(&scoreboard(game, clocks, local));
        out.push('\n');
        out.push_str(&format!("Mines left: {}\n", game.remaining_mine_count()));
        out.push_str(&board(game, local));
    }
    out
}
