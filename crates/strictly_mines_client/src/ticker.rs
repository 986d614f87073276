//! Frame-rate clock refresh between snapshots.
//!
//! A [`ClockTicker`] turns a [`ClockAnchor`] into a stream of displayed
//! values. At most one refresh task exists per ticker; replacing the anchor
//! or freezing the clock cancels it first.

use std::sync::Arc;
use std::time::Duration;
use strictly_mines::ClockAnchor;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

/// Source of "now" in milliseconds since the Unix epoch.
pub trait TimeSource: Send + Sync + 'static {
    /// Current wall-clock time.
    fn now_ms(&self) -> i64;
}

/// Wall clock of the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Displayed countdown for one clock slot.
pub struct ClockTicker {
    time: Arc<dyn TimeSource>,
    frame: Duration,
    display: Arc<watch::Sender<i64>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ClockTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockTicker")
            .field("frame", &self.frame)
            .field("displayed", &self.displayed())
            .field("ticking", &self.is_ticking())
            .finish()
    }
}

impl ClockTicker {
    /// Creates an idle ticker showing zero.
    pub fn new(time: Arc<dyn TimeSource>, frame: Duration) -> Self {
        let (display, _) = watch::channel(0);
        Self {
            time,
            frame,
            display: Arc::new(display),
            task: None,
        }
    }

    /// Receiver of displayed values; survives anchor changes.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.display.subscribe()
    }

    /// The value currently shown.
    pub fn displayed(&self) -> i64 {
        *self.display.borrow()
    }

    /// Returns true while a refresh task is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Re-anchors the clock.
    ///
    /// The new value is published at once. A running anchor then refreshes
    /// every frame until it reaches zero or the ticker is re-anchored,
    /// frozen or cancelled.
    #[instrument(skip(self), fields(time_left = anchor.time_left_ms(), running = anchor.is_running()))]
    pub fn set_anchor(&mut self, anchor: ClockAnchor) {
        self.cancel();
        let first = anchor.sample(self.time.now_ms());
        publish(&self.display, first);
        if !anchor.is_running() || first <= 0 {
            return;
        }

        let time = Arc::clone(&self.time);
        let display = Arc::clone(&self.display);
        let frame = self.frame;
        self.task = Some(tokio::spawn(async move {
            let mut frames = tokio::time::interval(frame);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            frames.tick().await;
            loop {
                frames.tick().await;
                let value = anchor.sample(time.now_ms());
                publish(&display, value);
                if value <= 0 {
                    debug!("Clock expired");
                    break;
                }
            }
        }));
    }

    /// Stops refreshing and keeps the last shown value.
    pub fn freeze(&mut self) {
        self.cancel();
    }

    /// Shows `time_left_ms` without refreshing.
    pub fn reset(&mut self, time_left_ms: i64) {
        self.set_anchor(ClockAnchor::frozen(time_left_ms));
    }

    /// Cancels the refresh task, if any. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn publish(display: &watch::Sender<i64>, value: i64) {
    display.send_if_modified(|shown| {
        if *shown == value {
            return false;
        }
        *shown = value;
        true
    });
}
