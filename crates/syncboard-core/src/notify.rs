//! User-facing sync notifications
//!
//! Sessions emit exactly one notification per sync attempt, on terminal
//! resolution: one success message, or at most one failure message. Poll
//! retries are silent.

use tokio::sync::mpsc;

/// Outcome class of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// A human-readable message about a sync outcome.
#[derive(Debug, Clone)]
pub struct Notification {
    pub resource_id: String,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn failure(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            kind: NotificationKind::Failure,
            message: message.into(),
        }
    }
}

/// Receives sync outcome messages for display.
///
/// Implementations must not block; sessions call this from their own event
/// handlers.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that drops all notifications.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

/// Channel-backed sink; the receiving side drains notifications at its own
/// pace.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver may already be gone; nothing to do then
        let _ = self.tx.send(notification);
    }
}
