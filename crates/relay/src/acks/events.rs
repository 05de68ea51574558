//! Per-alert acknowledgment event topics.

use crate::Recipient;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Events a subscriber misses while lagging are dropped by the broadcast
/// channel; acknowledgments are rare, so a small buffer is plenty.
const TOPIC_CAPACITY: usize = 16;

/// Fan-out of "this alert was acknowledged" notifications, one broadcast
/// topic per alert name. Subscribers receive the acknowledging recipient.
#[derive(Default)]
pub struct AckEvents {
    topics: DashMap<String, broadcast::Sender<Recipient>>,
}

impl AckEvents {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Subscribe to acknowledgments of one alert name.
    pub fn subscribe(&self, alert: &str) -> broadcast::Receiver<Recipient> {
        self.topics
            .entry(alert.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Emit an acknowledgment. Dropped silently when nobody listens.
    pub fn emit(&self, alert: &str, recipient: Recipient) {
        if let Some(topic) = self.topics.get(alert) {
            let receivers = topic.send(recipient).unwrap_or(0);
            tracing::debug!(alert = %alert, receivers, message = "Ack event emitted");
        }
    }
}
