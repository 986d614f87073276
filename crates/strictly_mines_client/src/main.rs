//! Strictly Mines - command-line client
//!
//! One-shot commands talk to the REST API; `watch` and `play` follow a game
//! through the push subscription.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{BoardArgs, Cli, Command};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strictly_mines::{BoardConfig, Game, GameId, PlayerId, format_clock};
use strictly_mines_client::{
    ActionDispatcher, ClientConfig, GameApi, GameStore, HttpGameApi, StompTransport, StoreView,
    joined_player, render,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

/// Redraw period for clocks while a game is followed.
const REDRAW: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match &cli.command {
        Command::Play { log_file, .. } => init_file_logging(log_file)?,
        _ => init_stderr_logging(),
    }

    let config = ClientConfig::load(cli.config.as_deref())?
        .with_overrides(cli.api_url.clone(), cli.ws_url.clone());
    info!(api_url = %config.api_url(), ws_url = %config.ws_url(), "Client configured");
    let api = HttpGameApi::new(&config)?;

    match cli.command {
        Command::Create { board } => create(&api, &board).await,
        Command::List { open } => list(&api, open).await,
        Command::Show { game_id, player_id } => show(&api, GameId::new(game_id), player_id).await,
        Command::Join { game_id, username } => join(&api, GameId::new(game_id), &username).await,
        Command::Move {
            game_id,
            player_id,
            row,
            col,
        } => {
            dispatcher(api, game_id, player_id)
                .submit_move(row, col)
                .await?;
            println!("Move sent");
            Ok(())
        }
        Command::Flag {
            game_id,
            player_id,
            row,
            col,
        } => {
            dispatcher(api, game_id, player_id)
                .toggle_flag(row, col)
                .await?;
            println!("Flag toggle sent");
            Ok(())
        }
        Command::Ready { game_id, player_id } => {
            dispatcher(api, game_id, player_id).mark_ready().await?;
            println!("Ready sent");
            Ok(())
        }
        Command::Watch { game_id, player_id } => {
            watch(&config, &api, GameId::new(game_id), PlayerId::new(player_id)).await
        }
        Command::Play {
            username,
            game,
            board,
            ..
        } => play(&config, api, &username, game.map(GameId::new), &board).await,
    }
}

fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Interactive play draws to stdout, so logs go to a file.
fn init_file_logging(path: &Path) -> Result<()> {
    let log_file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn board_config(args: &BoardArgs) -> Result<BoardConfig> {
    let board = match (args.rows, args.columns, args.mines) {
        (Some(rows), Some(columns), Some(mines)) => BoardConfig::new(rows, columns, mines),
        _ => args.difficulty.board(),
    };
    board.validate()?;
    Ok(board)
}

fn dispatcher(api: HttpGameApi, game_id: String, player_id: String) -> ActionDispatcher<HttpGameApi> {
    ActionDispatcher::new(Arc::new(api), GameId::new(game_id), PlayerId::new(player_id))
}

fn describe(game: &Game) -> String {
    let players = game
        .players()
        .iter()
        .map(|p| p.username().as_str())
        .collect::<Vec<_>>()
        .join(" vs ");
    format!(
        "{}  {}x{} / {} mines  {}  [{}]",
        game.id(),
        game.rows(),
        game.columns(),
        game.mine_count(),
        game.phase(),
        players
    )
}

#[instrument(skip(api))]
async fn create(api: &HttpGameApi, args: &BoardArgs) -> Result<()> {
    let board = board_config(args)?;
    let game = api.create_game(&board).await?;
    println!("{}", describe(&game));
    println!(
        "Turn budget: {}s per player",
        format_clock(board.time_budget_ms())
    );
    Ok(())
}

#[instrument(skip(api))]
async fn list(api: &HttpGameApi, open: bool) -> Result<()> {
    let games = if open {
        api.list_open_games().await?
    } else {
        api.list_games().await?
    };
    if games.is_empty() {
        println!("No games");
    }
    for game in &games {
        println!("{}", describe(game));
    }
    Ok(())
}

#[instrument(skip(api))]
async fn show(api: &HttpGameApi, game_id: GameId, player_id: Option<String>) -> Result<()> {
    let game = api.get_game(&game_id).await?;
    println!("{}", describe(&game));
    let local = player_id
        .map(PlayerId::new)
        .or_else(|| game.players().first().map(|p| p.id().clone()))
        .context("Game has no players to view it as")?;
    let clocks = [
        game.time_left(0).unwrap_or_default(),
        game.time_left(1).unwrap_or_default(),
    ];
    println!("{}", render::scoreboard(&game, clocks, &local));
    print!("{}", render::board(&game, &local));
    Ok(())
}

#[instrument(skip(api))]
async fn join(api: &HttpGameApi, game_id: GameId, username: &str) -> Result<()> {
    let game = api.join_game(&game_id, username).await?;
    let player = joined_player(&game, username).context("Joined player missing from roster")?;
    println!("Joined {} as {} (player id {})", game.id(), player.username(), player.id());
    Ok(())
}

fn clock_values(store: &GameStore<StompTransport>) -> [i64; 2] {
    [
        store.clock_value(0).unwrap_or_default(),
        store.clock_value(1).unwrap_or_default(),
    ]
}

fn follow(
    config: &ClientConfig,
    game: Game,
    local: PlayerId,
) -> GameStore<StompTransport> {
    let transport = Arc::new(StompTransport::new(config.ws_url().clone(), config.heartbeat()));
    let mut store = GameStore::new(transport, config);
    store.start(game.id().clone(), local);
    store.prime(game);
    store
}

fn redraw(view: &StoreView, clocks: [i64; 2], local: &PlayerId) {
    print!("\x1b[2J\x1b[H{}", render::screen(view, clocks, local));
}

#[instrument(skip(config, api))]
async fn watch(config: &ClientConfig, api: &HttpGameApi, game_id: GameId, local: PlayerId) -> Result<()> {
    let game = api.get_game(&game_id).await?;
    let store = follow(config, game, local.clone());
    let mut views = store.subscribe();
    let mut frames = tokio::time::interval(REDRAW);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = frames.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
        let view = store.view();
        redraw(&view, clock_values(&store), &local);
    }
}

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Reveal(usize, usize),
    Flag(usize, usize),
    Ready,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let cell = |row: &str, col: &str| -> Option<(usize, usize)> {
        Some((row.parse().ok()?, col.parse().ok()?))
    };
    match words.as_slice() {
        ["r" | "reveal", row, col] => cell(*row, *col).map(|(r, c)| Input::Reveal(r, c)),
        ["f" | "flag", row, col] => cell(*row, *col).map(|(r, c)| Input::Flag(r, c)),
        ["ready"] => Some(Input::Ready),
        ["q" | "quit"] => Some(Input::Quit),
        _ => None,
    }
}

#[instrument(skip(config, api, args))]
async fn play(
    config: &ClientConfig,
    api: HttpGameApi,
    username: &str,
    game_id: Option<GameId>,
    args: &BoardArgs,
) -> Result<()> {
    let game_id = match game_id {
        Some(id) => id,
        None => {
            let created = api.create_game(&board_config(args)?).await?;
            info!(game_id = %created.id(), "Created game to play");
            created.id().clone()
        }
    };
    let game = api.join_game(&game_id, username).await?;
    let Some(me) = joined_player(&game, username).map(|p| p.id().clone()) else {
        bail!("Joined player {} missing from roster", username);
    };
    info!(player_id = %me, "Joined");

    let store = follow(config, game, me.clone());
    let actions = ActionDispatcher::new(Arc::new(api), game_id, me.clone());
    let mut views = store.subscribe();
    let mut frames = tokio::time::interval(REDRAW);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut notice = String::from("Commands: r ROW COL, f ROW COL, ready, q");

    loop {
        tokio::select! {
            _ = views.changed() => {}
            _ = frames.tick() => {}
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                let outcome = match parse_input(&line) {
                    Some(Input::Reveal(row, col)) => actions.submit_move(row, col).await,
                    Some(Input::Flag(row, col)) => actions.toggle_flag(row, col).await,
                    Some(Input::Ready) => actions.mark_ready().await,
                    Some(Input::Quit) => return Ok(()),
                    None => {
                        notice = format!("Unrecognized input: {}", line.trim());
                        continue;
                    }
                };
                notice = match outcome {
                    Ok(()) => String::new(),
                    Err(e) => {
                        warn!(error = %e, "Action failed");
                        e.to_string()
                    }
                };
            }
        }
        let view = store.view();
        redraw(&view, clock_values(&store), &me);
        if !notice.is_empty() {
            println!("{}", notice);
        }
        debug!(connection = %view.connection(), "Redrawn");
    }
}
