//! User-facing notifications.
//!
//! Components never render toasts themselves; they hand a [`Notification`] to
//! whatever [`Notifier`] the host wired in. [`ChannelNotifier`] forwards them
//! over a tokio channel so a renderer (or a test) can drain them.

use std::time::Instant;

use compact_str::CompactString;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Notification levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NotificationLevel {
    Info = 0,
    Success = 1,
    Warning = 2,
    Error = 3,
}

/// Compact notification with timestamp
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: CompactString,
    pub description: Option<String>,
    pub timestamp: Instant,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<CompactString>) -> Self {
        Self {
            level,
            message: message.into(),
            description: None,
            timestamp: Instant::now(),
        }
    }

    /// Attach a description; empty strings are dropped.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.is_empty() {
            self.description = Some(description);
        }
        self
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification::new(NotificationLevel::Success, message));
    }

    fn error(&self, message: &str, description: &str) {
        self.notify(Notification::new(NotificationLevel::Error, message).with_description(description));
    }
}

/// Notifier backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        debug!(
            marker = "NOTIFICATION_SENT",
            operation_type = "notify",
            level = ?notification.level,
            message = %notification.message,
            "Notification queued"
        );

        if self.tx.send(notification).is_err() {
            warn!(
                marker = "NOTIFICATION_DROPPED",
                operation_type = "notify",
                "Notification receiver closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();

        notifier.success("Saved");
        notifier.error("Update failed", "Name taken, Code taken");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NotificationLevel::Success);
        assert_eq!(first.message, "Saved");
        assert!(first.description.is_none());

        let second = rx.recv().await.unwrap();
        assert_eq!(second.level, NotificationLevel::Error);
        assert_eq!(second.description.as_deref(), Some("Name taken, Code taken"));
    }

    #[test]
    fn test_empty_description_is_dropped() {
        let n = Notification::new(NotificationLevel::Info, "hello").with_description("");
        assert!(n.description.is_none());
    }

    #[test]
    fn test_closed_receiver_does_not_panic() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.success("nobody listening");
    }
}
