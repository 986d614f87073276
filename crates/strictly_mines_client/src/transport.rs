//! Push transport: how snapshot payloads reach the client.
//!
//! [`PushTransport`] hides the wire protocol from the subscription channel.
//! [`StompTransport`] is the production implementation: STOMP frames over a
//! WebSocket, subscribed to the game's topic.

use crate::TransportError;
use crate::stomp::{Command, Frame};
use async_trait::async_trait;
use derive_getters::Getters;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use strictly_mines::{GameId, PlayerId};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

/// Subscription identifier used for the single topic subscription.
const SUBSCRIPTION_ID: &str = "sub-0";

/// Missed server heart-beats tolerated before the connection counts as lost.
const SILENCE_FACTOR: u32 = 2;

/// Identity of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters)]
pub struct Topic {
    /// Game whose snapshots are wanted.
    game_id: GameId,
    /// Local player; sent so the server can associate the connection.
    player_id: PlayerId,
}

impl Topic {
    /// Creates a topic.
    pub fn new(game_id: GameId, player_id: PlayerId) -> Self {
        Self { game_id, player_id }
    }

    /// Broker destination, e.g. `/topic/games/abc`.
    pub fn destination(&self) -> String {
        format!("/topic/games/{}", self.game_id)
    }
}

/// An established subscription yielding raw snapshot payloads.
#[async_trait]
pub trait PushSession: Send {
    /// Waits for the next payload.
    ///
    /// `None` means the server ended the session cleanly; an error means
    /// it was lost. Either way the session is finished.
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>>;

    /// Releases the subscription and the connection. Never fails.
    async fn close(&mut self);
}

/// Opens push sessions for a topic.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Connects and subscribes, returning once the subscription is live.
    async fn connect(&self, topic: &Topic) -> Result<Box<dyn PushSession>, TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// STOMP-over-WebSocket push transport.
#[derive(Debug, Clone, Getters)]
pub struct StompTransport {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws`.
    ws_url: String,
    /// Heart-beat period offered in both directions; zero disables it.
    heartbeat: Duration,
}

impl StompTransport {
    /// Creates a transport for `ws_url`.
    pub fn new(ws_url: impl Into<String>, heartbeat: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            heartbeat,
        }
    }

    fn host(&self) -> &str {
        let without_scheme = self
            .ws_url
            .split_once("://")
            .map_or(self.ws_url.as_str(), |(_, rest)| rest);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> Result<(), TransportError> {
    ws.send(Message::Text(frame.encode().into())).await?;
    Ok(())
}

/// Reads until a frame other than a heart-beat arrives.
async fn next_frame(ws: &mut WsStream) -> Option<Result<Frame, TransportError>> {
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => match Frame::parse(text.as_str()) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => return Some(Err(TransportError::new(e.to_string()))),
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => return Some(Err(e.into())),
        }
    }
}

fn error_frame_message(frame: &Frame) -> String {
    let summary = frame.get("message").unwrap_or("no message");
    if frame.body().is_empty() {
        format!("Broker error: {}", summary)
    } else {
        format!("Broker error: {}: {}", summary, frame.body())
    }
}

#[async_trait]
impl PushTransport for StompTransport {
    #[instrument(skip(self, topic), fields(ws_url = %self.ws_url, destination = %topic.destination()))]
    async fn connect(&self, topic: &Topic) -> Result<Box<dyn PushSession>, TransportError> {
        debug!("Opening WebSocket");
        let (mut ws, _response) = tokio_tungstenite::connect_async(self.ws_url.as_str()).await?;

        let beat = self.heartbeat.as_millis().to_string();
        let connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", self.host())
            .header("heart-beat", format!("{beat},{beat}"));
        send_frame(&mut ws, &connect).await?;

        let connected = match next_frame(&mut ws).await {
            Some(Ok(frame)) if frame.command() == Command::Connected => frame,
            Some(Ok(frame)) if frame.command() == Command::Error => {
                return Err(TransportError::new(error_frame_message(&frame)));
            }
            Some(Ok(frame)) => {
                return Err(TransportError::new(format!(
                    "Expected CONNECTED, received {}",
                    frame.command()
                )));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(TransportError::new("Connection closed during handshake")),
        };
        let (outgoing, incoming) = negotiate_heartbeat(self.heartbeat, connected.get("heart-beat"));
        debug!(
            version = connected.get("version"),
            outgoing_ms = outgoing.map(|d| d.as_millis() as u64),
            incoming_ms = incoming.map(|d| d.as_millis() as u64),
            "STOMP session established"
        );

        let subscribe = Frame::new(Command::Subscribe)
            .header("id", SUBSCRIPTION_ID)
            .header("destination", topic.destination())
            .header("gameId", topic.game_id().as_str())
            .header("playerId", topic.player_id().as_str());
        send_frame(&mut ws, &subscribe).await?;
        info!("Subscribed");

        let heartbeat = outgoing.map(|period| {
            let mut beats = tokio::time::interval_at(Instant::now() + period, period);
            beats.set_missed_tick_behavior(MissedTickBehavior::Delay);
            beats
        });

        Ok(Box::new(StompSession {
            ws,
            heartbeat,
            silence_limit: incoming.map(|period| period * SILENCE_FACTOR),
            last_read: Instant::now(),
            closed: false,
        }))
    }
}

/// Agreed heart-beat periods as (client sends every, server sends every).
///
/// Each direction is on only when both sides offer it, at the slower of
/// the two periods. A missing or unreadable server header means `0,0`.
fn negotiate_heartbeat(
    offered: Duration,
    server: Option<&str>,
) -> (Option<Duration>, Option<Duration>) {
    let (server_sends, server_wants) = server
        .and_then(|header| header.split_once(','))
        .and_then(|(x, y)| Some((x.trim().parse::<u64>().ok()?, y.trim().parse::<u64>().ok()?)))
        .unwrap_or((0, 0));
    let ours = u64::try_from(offered.as_millis()).unwrap_or(u64::MAX);
    let agree = |mine: u64, theirs: u64| {
        (mine > 0 && theirs > 0).then(|| Duration::from_millis(mine.max(theirs)))
    };
    (agree(ours, server_wants), agree(ours, server_sends))
}

struct StompSession {
    ws: WsStream,
    heartbeat: Option<Interval>,
    silence_limit: Option<Duration>,
    last_read: Instant,
    closed: bool,
}

async fn beat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(beats) => {
            beats.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once the server has been quiet for `limit` since `last_read`.
async fn silence(limit: Option<Duration>, last_read: Instant) {
    match limit {
        Some(limit) => tokio::time::sleep_until(last_read + limit).await,
        None => std::future::pending::<()>().await,
    }
}

#[async_trait]
impl PushSession for StompSession {
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>> {
        if self.closed {
            return None;
        }
        let Self {
            ws,
            heartbeat,
            silence_limit,
            last_read,
            ..
        } = self;
        loop {
            tokio::select! {
                _ = beat(heartbeat) => {
                    if let Err(e) = ws.send(Message::Text("\n".into())).await {
                        return Some(Err(e.into()));
                    }
                }
                _ = silence(*silence_limit, *last_read) => {
                    warn!("Server heart-beats stopped");
                    return Some(Err(TransportError::new("No heart-beat from server")));
                }
                message = ws.next() => {
                    *last_read = Instant::now();
                    let text = match message? {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Close(_)) => return None,
                        Ok(_) => continue,
                        Err(e) => return Some(Err(e.into())),
                    };
                    let frame = match Frame::parse(text.as_str()) {
                        Ok(Some(frame)) => frame,
                        Ok(None) => continue,
                        Err(e) => return Some(Err(TransportError::new(e.to_string()))),
                    };
                    match frame.command() {
                        Command::Message => return Some(Ok(frame.into_body())),
                        Command::Error => {
                            return Some(Err(TransportError::new(error_frame_message(&frame))));
                        }
                        other => debug!(command = %other, "Ignoring frame"),
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let unsubscribe = Frame::new(Command::Unsubscribe).header("id", SUBSCRIPTION_ID);
        let disconnect = Frame::new(Command::Disconnect);
        for frame in [unsubscribe, disconnect] {
            if let Err(e) = send_frame(&mut self.ws, &frame).await {
                debug!(error = %e, "Could not send {} frame", frame.command());
                break;
            }
        }
        if let Err(e) = self.ws.close(None).await {
            warn!(error = %e, "WebSocket close failed");
        }
    }
}
