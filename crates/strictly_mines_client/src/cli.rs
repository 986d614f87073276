//! Command-line interface for the strictly_mines client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strictly_mines::Difficulty;

/// Strictly Mines - two-player competitive minesweeper client
#[derive(Parser, Debug)]
#[command(name = "strictly_mines")]
#[command(about = "Client for the two-player minesweeper server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the REST base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Override the STOMP WebSocket URL
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Board selection for a new game
#[derive(clap::Args, Debug, Clone)]
pub struct BoardArgs {
    /// Preset board
    #[arg(short, long, default_value = "easy")]
    pub difficulty: Difficulty,

    /// Custom row count (requires --columns and --mines)
    #[arg(long, requires_all = ["columns", "mines"])]
    pub rows: Option<usize>,

    /// Custom column count
    #[arg(long, requires_all = ["rows", "mines"])]
    pub columns: Option<usize>,

    /// Custom mine count
    #[arg(long, requires_all = ["rows", "columns"])]
    pub mines: Option<usize>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a game
    Create {
        #[command(flatten)]
        board: BoardArgs,
    },

    /// List games
    List {
        /// Only games that are waiting for a second player
        #[arg(long)]
        open: bool,
    },

    /// Print a game's current state
    Show {
        /// Game id
        game_id: String,

        /// View the game as this player
        #[arg(long = "as")]
        player_id: Option<String>,
    },

    /// Join a game and print the assigned player id
    Join {
        /// Game id
        game_id: String,

        /// Display name
        username: String,
    },

    /// Reveal a cell
    Move {
        /// Game id
        game_id: String,
        /// Acting player id
        player_id: String,
        /// Row index
        row: usize,
        /// Column index
        col: usize,
    },

    /// Place or remove a flag
    Flag {
        /// Game id
        game_id: String,
        /// Acting player id
        player_id: String,
        /// Row index
        row: usize,
        /// Column index
        col: usize,
    },

    /// Mark a player ready
    Ready {
        /// Game id
        game_id: String,
        /// Acting player id
        player_id: String,
    },

    /// Follow a game's snapshots and print each change
    Watch {
        /// Game id
        game_id: String,
        /// Local player id
        player_id: String,
    },

    /// Join (or create and join) a game and play it interactively
    Play {
        /// Display name
        username: String,

        /// Game to join; a new one is created when omitted
        #[arg(long)]
        game: Option<String>,

        #[command(flatten)]
        board: BoardArgs,

        /// Log file for the session
        #[arg(long, default_value = "strictly_mines.log")]
        log_file: PathBuf,
    },
}
