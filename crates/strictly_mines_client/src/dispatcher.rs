//! Player actions bound to one game session.

use crate::{ActionError, GameApi};
use std::sync::Arc;
use strictly_mines::{GameId, PlayerId};
use tracing::{info, instrument, warn};

/// Sends the local player's actions for one game.
///
/// Never consults a held snapshot. The server decides whether an action is
/// allowed and the resulting state arrives through the push channel. Callers may use
/// [`strictly_mines::StatusView`] flags to hide controls, but a call is
/// always forwarded.
#[derive(Debug)]
pub struct ActionDispatcher<A: GameApi + ?Sized> {
    api: Arc<A>,
    game_id: GameId,
    player_id: PlayerId,
}

impl<A: GameApi + ?Sized> Clone for ActionDispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            game_id: self.game_id.clone(),
            player_id: self.player_id.clone(),
        }
    }
}

impl<A: GameApi + ?Sized> ActionDispatcher<A> {
    /// Binds `api` to a game and player.
    pub fn new(api: Arc<A>, game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            api,
            game_id,
            player_id,
        }
    }

    /// Game the actions target.
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    /// Player the actions are sent as.
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Requests a reveal of (`row`, `col`).
    #[instrument(skip(self), fields(game_id = %self.game_id, player_id = %self.player_id))]
    pub async fn submit_move(&self, row: usize, col: usize) -> Result<(), ActionError> {
        info!("Submitting move");
        self.api
            .make_move(&self.game_id, &self.player_id, row, col)
            .await
            .inspect_err(|e| warn!(error = %e, "Move not accepted"))
    }

    /// Requests a flag toggle on (`row`, `col`).
    ///
    /// A 404 from the server is a refused toggle and comes back as
    /// [`ActionError::Rejected`].
    #[instrument(skip(self), fields(game_id = %self.game_id, player_id = %self.player_id))]
    pub async fn toggle_flag(&self, row: usize, col: usize) -> Result<(), ActionError> {
        info!("Toggling flag");
        self.api
            .toggle_flag(&self.game_id, &self.player_id, row, col)
            .await
            .map_err(ActionError::for_flag_toggle)
            .inspect_err(|e| warn!(error = %e, "Flag toggle not accepted"))
    }

    /// Requests that the local player be marked ready.
    #[instrument(skip(self), fields(game_id = %self.game_id, player_id = %self.player_id))]
    pub async fn mark_ready(&self) -> Result<(), ActionError> {
        info!("Marking ready");
        self.api
            .mark_ready(&self.game_id, &self.player_id)
            .await
            .inspect_err(|e| warn!(error = %e, "Ready not accepted"))
    }
}
