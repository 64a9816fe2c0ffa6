//! Verification and coach-entry notifications.
//!
//! Delivery is fire-and-forget: a notification that cannot be handed off is
//! logged and dropped, it never fails the workflow that produced it.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{Receiver, Sender};
use uuid::Uuid;

/// Events the workflow emits towards the platform's notification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// An athlete named a controller; the controller should go verify.
    VerificationRequested {
        result_id: Uuid,
        athlete_id: Uuid,
        controller_id: Uuid,
    },
    /// The controller accepted the result.
    ResultVerified {
        result_id: Uuid,
        athlete_id: Uuid,
        controller_id: Uuid,
    },
    /// The controller rejected the result.
    ResultRejected {
        result_id: Uuid,
        athlete_id: Uuid,
        controller_id: Uuid,
    },
    /// A coach recorded a result on the athlete's behalf.
    CoachResultRecorded {
        result_id: Uuid,
        athlete_id: Uuid,
        coach_id: Uuid,
    },
}

/// Sink for workflow notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Sink that forwards events over a crossbeam channel to whatever transport
/// the embedder runs on the other end.
pub struct ChannelNotifier {
    tx: Sender<NotificationEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver its consumer drains.
    pub fn new() -> (Self, Receiver<NotificationEvent>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("Notification receiver gone, dropping event: {}", e);
        }
    }
}

/// Sink that moves delivery off the calling thread: events go over a
/// crossbeam channel to a worker that feeds the wrapped sink. Dropping the
/// notifier closes the channel and joins the worker after it drains.
pub struct ThreadedNotifier {
    tx: Option<Sender<NotificationEvent>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadedNotifier {
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, rx) = crossbeam::channel::unbounded::<NotificationEvent>();
        let worker = thread::spawn(move || {
            for event in rx.iter() {
                sink.notify(event);
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }
}

impl NotificationSink for ThreadedNotifier {
    fn notify(&self, event: NotificationEvent) {
        let sent = match &self.tx {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        };
        if !sent {
            tracing::warn!("Notification worker gone, dropping event");
        }
    }
}

impl Drop for ThreadedNotifier {
    fn drop(&mut self) {
        // Close the channel first so the worker's loop ends once drained.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Notification worker panicked");
            }
        }
    }
}

/// Sink that swallows everything. Used where notifications are optional.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, event: NotificationEvent) {
        tracing::debug!(?event, "Notifications disabled, dropping event");
    }
}
