//! Strictly Mines client - keeps a local view in sync with the game server
//!
//! Actions go out as plain requests; state only ever comes back as complete
//! snapshots pushed over a STOMP subscription. The pieces:
//!
//! - **Api**: [`GameApi`] and its HTTP implementation
//! - **Dispatcher**: the local player's move/flag/ready actions
//! - **Transport**: STOMP over WebSocket behind [`PushTransport`]
//! - **Channel**: one long-lived subscription with fixed-delay resubscription
//! - **Store**: the held snapshot, its status view and both clocks
//! - **Ticker**: frame-rate countdown between snapshots
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_mines::{GameId, PlayerId};
//! use strictly_mines_client::{ActionDispatcher, ClientConfig, GameStore, HttpGameApi, StompTransport};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::load(None)?;
//! let api = Arc::new(HttpGameApi::new(&config)?);
//! let transport = Arc::new(StompTransport::new(config.ws_url().clone(), config.heartbeat()));
//!
//! let game_id = GameId::new("abc");
//! let me = PlayerId::new("p1");
//! let mut store = GameStore::new(transport, &config);
//! store.start(game_id.clone(), me.clone());
//!
//! let actions = ActionDispatcher::new(api, game_id, me);
//! actions.mark_ready().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod channel;
mod config;
mod dispatcher;
mod error;
pub mod render;
pub mod stomp;
mod store;
mod ticker;
mod transport;

#[cfg(test)]
mod testing;

pub use api::{GameApi, HttpGameApi, is_open, joined_player};
pub use channel::{ChannelEvent, EventStream, SubscriptionChannel};
pub use config::{API_URL_ENV, ClientConfig, WS_URL_ENV};
pub use dispatcher::ActionDispatcher;
pub use error::{ActionError, ConfigError, TransportError};
pub use store::{ConnectionState, GameStore, StoreView};
pub use ticker::{ClockTicker, SystemTimeSource, TimeSource};
pub use transport::{PushSession, PushTransport, StompTransport, Topic};
