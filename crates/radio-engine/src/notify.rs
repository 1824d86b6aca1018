//! Fan-out of on-air notifications to listening clients.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::debug;

use radio_ipc::{Notification, UpdateMessage};
use radio_transport::{BroadcastSink, PublishReport, SessionId};

/// Delivers timestamped notifications to every subscriber.
///
/// A subscriber that lets its queue fill up is dropped, exactly like a slow
/// audio session.
pub struct NotificationHub {
    sink: BroadcastSink<UpdateMessage>,
}

impl NotificationHub {
    /// Create a hub whose subscribers buffer up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            sink: BroadcastSink::new(capacity),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> (SessionId, mpsc::Receiver<UpdateMessage>) {
        let id = self.sink.allocate_id();
        let rx = self.sink.attach(id);
        debug!(subscriber = %id, "Notification subscriber attached");
        (id, rx)
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: SessionId) -> bool {
        self.sink.detach(id)
    }

    /// Stamp and deliver a notification.
    pub fn publish(&self, notification: Notification) -> PublishReport {
        let kind = notification.kind();
        let message = UpdateMessage {
            timestamp_ms: now_ms(),
            notification,
        };
        let report = self.sink.publish(message);
        debug!(kind, delivered = report.delivered, "Notification published");
        report
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
