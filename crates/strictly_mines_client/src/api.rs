//! Request/response access to the game server's REST surface.

use crate::{ActionError, ClientConfig};
use async_trait::async_trait;
use derive_new::new;
use serde::Serialize;
use strictly_mines::{BoardConfig, Game, GameId, GamePhase, Player, PlayerId};
use tracing::{debug, info, instrument, warn};

/// Everything the client can ask the server to do.
///
/// Mutating calls only acknowledge the request. The resulting state
/// arrives as a pushed snapshot, never through these return values.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Creates a game and returns its initial snapshot.
    async fn create_game(&self, board: &BoardConfig) -> Result<Game, ActionError>;

    /// Fetches the current snapshot of a game.
    async fn get_game(&self, game_id: &GameId) -> Result<Game, ActionError>;

    /// Fetches every game the server knows about.
    async fn list_games(&self) -> Result<Vec<Game>, ActionError>;

    /// Joins a game; the returned snapshot contains the new player.
    async fn join_game(&self, game_id: &GameId, username: &str) -> Result<Game, ActionError>;

    /// Reveals a cell.
    async fn make_move(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError>;

    /// Places or removes a flag.
    async fn toggle_flag(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError>;

    /// Marks the player ready.
    async fn mark_ready(&self, game_id: &GameId, player_id: &PlayerId) -> Result<(), ActionError>;

    /// Games with exactly one player that are still waiting for an opponent.
    async fn list_open_games(&self) -> Result<Vec<Game>, ActionError> {
        let games = self.list_games().await?;
        Ok(games.into_iter().filter(is_open).collect())
    }
}

/// Returns true if `game` can still be joined.
pub fn is_open(game: &Game) -> bool {
    game.players().len() == 1 && *game.phase() == GamePhase::WaitingForPlayers
}

/// The player a join created, found by username.
///
/// The server appends joiners to the roster, so the last match wins when
/// two players share a name.
pub fn joined_player<'a>(game: &'a Game, username: &str) -> Option<&'a Player> {
    game.players().iter().rev().find(|p| p.username() == username)
}

#[derive(Debug, Serialize, new)]
struct JoinRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize, new)]
#[serde(rename_all = "camelCase")]
struct CellRequest<'a> {
    player_id: &'a PlayerId,
    row: usize,
    col: usize,
}

#[derive(Debug, Serialize, new)]
#[serde(rename_all = "camelCase")]
struct ReadyRequest<'a> {
    player_id: &'a PlayerId,
}

/// [`GameApi`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpGameApi {
    /// Creates a client for the server named in `config`.
    #[instrument(skip(config), fields(api_url = %config.api_url()))]
    pub fn new(config: &ClientConfig) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            endpoint: config.games_endpoint(),
            client,
        })
    }

    fn game_url(&self, game_id: &GameId, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/{}/{}", self.endpoint, game_id, action),
            None => format!("{}/{}", self.endpoint, game_id),
        }
    }

    /// Sends a request and turns non-success statuses into errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ActionError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("no reason given").to_string()
        } else {
            body
        };
        warn!(status = %status, message = %message, "Request failed");
        Err(ActionError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    #[instrument(skip(self), fields(rows = board.rows(), columns = board.columns(), mines = board.mine_count()))]
    async fn create_game(&self, board: &BoardConfig) -> Result<Game, ActionError> {
        info!("Creating game");
        let game: Game = self
            .send(self.client.post(&self.endpoint).json(board))
            .await?
            .json()
            .await?;
        info!(game_id = %game.id(), "Game created");
        Ok(game)
    }

    #[instrument(skip(self), fields(game_id = %game_id))]
    async fn get_game(&self, game_id: &GameId) -> Result<Game, ActionError> {
        debug!("Fetching game");
        let game = self
            .send(self.client.get(self.game_url(game_id, None)))
            .await?
            .json()
            .await?;
        Ok(game)
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<Game>, ActionError> {
        debug!("Listing games");
        let games: Vec<Game> = self
            .send(self.client.get(&self.endpoint))
            .await?
            .json()
            .await?;
        debug!(count = games.len(), "Listed games");
        Ok(games)
    }

    #[instrument(skip(self), fields(game_id = %game_id, username = %username))]
    async fn join_game(&self, game_id: &GameId, username: &str) -> Result<Game, ActionError> {
        info!("Joining game");
        let game: Game = self
            .send(
                self.client
                    .post(self.game_url(game_id, Some("join")))
                    .json(&JoinRequest::new(username)),
            )
            .await?
            .json()
            .await?;
        Ok(game)
    }

    #[instrument(skip(self), fields(game_id = %game_id, player_id = %player_id))]
    async fn make_move(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError> {
        debug!("Sending move");
        self.send(
            self.client
                .post(self.game_url(game_id, Some("move")))
                .json(&CellRequest::new(player_id, row, col)),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(game_id = %game_id, player_id = %player_id))]
    async fn toggle_flag(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        row: usize,
        col: usize,
    ) -> Result<(), ActionError> {
        debug!("Sending flag toggle");
        self.send(
            self.client
                .post(self.game_url(game_id, Some("flag")))
                .json(&CellRequest::new(player_id, row, col)),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(game_id = %game_id, player_id = %player_id))]
    async fn mark_ready(&self, game_id: &GameId, player_id: &PlayerId) -> Result<(), ActionError> {
        debug!("Sending ready");
        self.send(
            self.client
                .post(self.game_url(game_id, Some("ready")))
                .json(&ReadyRequest::new(player_id)),
        )
        .await?;
        Ok(())
    }
}
