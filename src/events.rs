//! Move notifications for UI and desktop-notification layers.
//!
//! Backed by a bounded `tokio::sync::broadcast` channel. Sending never
//! waits: with no subscribers the event is dropped, and a subscriber
//! that falls behind loses the oldest events.

use crate::config::FlowConfig;
use crate::models::{MoveEvent, OrganizeOutcome};
use tokio::sync::broadcast;

/// Events buffered per subscriber before the oldest are dropped
pub const EVENT_CAPACITY: usize = 256;

pub fn channel() -> broadcast::Sender<MoveEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Emits [`MoveEvent`]s according to the notification settings of one
/// configuration
#[derive(Clone)]
pub struct MoveNotifier {
    sender: broadcast::Sender<MoveEvent>,
    notify_on_move: bool,
    notify_sensitive_moves: bool,
}

impl MoveNotifier {
    pub fn new(sender: broadcast::Sender<MoveEvent>, config: &FlowConfig) -> Self {
        Self {
            sender,
            notify_on_move: config.notify_on_move,
            notify_sensitive_moves: config.notify_sensitive_moves,
        }
    }

    /// Notifier with its own channel and nobody listening
    pub fn detached(config: &FlowConfig) -> Self {
        Self::new(channel(), config)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoveEvent> {
        self.sender.subscribe()
    }

    /// Publish a move; other outcomes are ignored
    pub fn emit(&self, outcome: &OrganizeOutcome) {
        let OrganizeOutcome::Moved {
            from,
            to,
            category,
            is_sensitive,
            ..
        } = outcome
        else {
            return;
        };

        if !self.notify_on_move || (*is_sensitive && !self.notify_sensitive_moves) {
            return;
        }

        let event = MoveEvent {
            path: from.clone(),
            destination: to.clone(),
            category: category.clone(),
            is_sensitive: *is_sensitive,
        };

        // Err only means nobody is subscribed
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn moved(is_sensitive: bool) -> OrganizeOutcome {
        OrganizeOutcome::Moved {
            from: PathBuf::from("/drop/a.jpg"),
            to: PathBuf::from("/home/Images/SFW/a.jpg"),
            category: "Images".to_string(),
            is_sensitive,
            renamed: false,
        }
    }

    #[test]
    fn test_emit_reaches_subscriber() {
        let notifier = MoveNotifier::detached(&FlowConfig::default());
        let mut rx = notifier.subscribe();

        notifier.emit(&moved(false));
        notifier.emit(&OrganizeOutcome::Skipped {
            path: PathBuf::from("/drop/b.jpg"),
            reason: "claimed".to_string(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.category, "Images");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sensitive_moves_can_be_muted() {
        let mut config = FlowConfig::default();
        config.notify_sensitive_moves = false;
        let notifier = MoveNotifier::detached(&config);
        let mut rx = notifier.subscribe();

        notifier.emit(&moved(true));
        notifier.emit(&moved(false));

        assert!(!rx.try_recv().unwrap().is_sensitive);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_does_not_block() {
        let notifier = MoveNotifier::detached(&FlowConfig::default());
        for _ in 0..(EVENT_CAPACITY * 4) {
            notifier.emit(&moved(false));
        }
    }
}
