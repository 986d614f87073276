//! Long-lived push subscription with automatic resubscription.
//!
//! A [`SubscriptionChannel`] owns at most one subscription. Opening a new
//! one always tears down the previous one first, so a consumer never sees
//! interleaved deliveries from two topics.

use crate::{PushSession, PushTransport, Topic};
use std::sync::Arc;
use std::time::Duration;
use strictly_mines::{Game, GameId, PlayerId, ProtocolAnomaly};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How long a replaced subscription may take to unsubscribe cleanly.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Something that happened on a subscription, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The subscription is live; snapshots may follow.
    Connected,
    /// A decoded snapshot, not yet validated.
    Snapshot(Box<Game>),
    /// A payload that did not decode.
    Malformed(ProtocolAnomaly),
    /// The subscription was lost and will be retried after the delay.
    Disconnected {
        /// Why the connection failed or ended.
        reason: String,
    },
}

/// Receiving end of one subscription's events.
pub type EventStream = mpsc::UnboundedReceiver<ChannelEvent>;

struct ActiveSubscription {
    topic: Topic,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

/// Holds the single push subscription of a client.
pub struct SubscriptionChannel<T: PushTransport> {
    transport: Arc<T>,
    reconnect_delay: Duration,
    active: Option<ActiveSubscription>,
}

impl<T: PushTransport> SubscriptionChannel<T> {
    /// Creates a channel with no subscription.
    pub fn new(transport: Arc<T>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            reconnect_delay,
            active: None,
        }
    }

    /// Subscribes to `game_id`'s snapshots on behalf of `player_id`.
    ///
    /// Any existing subscription is closed first, even one for the same
    /// topic. The returned stream yields events until [`close`](Self::close)
    /// or the next `open`.
    #[instrument(skip(self), fields(game_id = %game_id, player_id = %player_id))]
    pub fn open(&mut self, game_id: GameId, player_id: PlayerId) -> EventStream {
        self.close();

        let topic = Topic::new(game_id, player_id);
        let (events, stream) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_subscription(
            Arc::clone(&self.transport),
            topic.clone(),
            self.reconnect_delay,
            events,
            shutdown_rx,
        ));
        info!(destination = %topic.destination(), "Subscription opened");

        self.active = Some(ActiveSubscription {
            topic,
            shutdown,
            worker,
        });
        stream
    }

    /// Stops the subscription and any pending retry. Idempotent.
    pub fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        info!(destination = %active.topic.destination(), "Closing subscription");
        let _ = active.shutdown.send(true);

        let mut worker = active.worker;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if tokio::time::timeout(CLOSE_GRACE, &mut worker).await.is_err() {
                        warn!("Subscription did not close in time, aborting");
                        worker.abort();
                    }
                });
            }
            Err(_) => worker.abort(),
        }
    }

    /// Returns true while a subscription is held.
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Topic of the held subscription.
    pub fn active_topic(&self) -> Option<&Topic> {
        self.active.as_ref().map(|a| &a.topic)
    }
}

impl<T: PushTransport> Drop for SubscriptionChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolves once shutdown is requested or the channel is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn decode(payload: &str) -> ChannelEvent {
    match serde_json::from_str::<Game>(payload) {
        Ok(game) => ChannelEvent::Snapshot(Box::new(game)),
        Err(e) => ChannelEvent::Malformed(ProtocolAnomaly::MalformedSnapshot {
            reason: e.to_string(),
        }),
    }
}

#[instrument(skip_all, fields(destination = %topic.destination()))]
async fn run_subscription<T: PushTransport>(
    transport: Arc<T>,
    topic: Topic,
    reconnect_delay: Duration,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let connected = tokio::select! {
            _ = stopped(&mut shutdown) => return,
            result = transport.connect(&topic) => result,
        };

        let reason = match connected {
            Ok(mut session) => {
                if events.send(ChannelEvent::Connected).is_err() {
                    session.close().await;
                    return;
                }
                match pump(session.as_mut(), &events, &mut shutdown).await {
                    Some(reason) => {
                        session.close().await;
                        reason
                    }
                    None => {
                        session.close().await;
                        debug!("Subscription worker stopped");
                        return;
                    }
                }
            }
            Err(e) => e.message,
        };

        warn!(reason = %reason, delay_ms = reconnect_delay.as_millis() as u64, "Subscription lost, retrying");
        if events
            .send(ChannelEvent::Disconnected { reason })
            .is_err()
        {
            return;
        }

        tokio::select! {
            _ = stopped(&mut shutdown) => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// Forwards payloads until the session ends.
///
/// Returns the failure reason when the session was lost, or `None` when
/// the worker should stop for good.
async fn pump(
    session: &mut dyn PushSession,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<String> {
    loop {
        let next = tokio::select! {
            _ = stopped(shutdown) => return None,
            next = session.next_payload() => next,
        };
        let event = match next {
            Some(Ok(payload)) => decode(&payload),
            Some(Err(e)) => return Some(e.message),
            None => return Some("Server ended the subscription".to_string()),
        };
        if *shutdown.borrow() || events.send(event).is_err() {
            return None;
        }
    }
}
