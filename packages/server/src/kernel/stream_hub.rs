//! In-process pub/sub hub feeding the SSE endpoint.
//!
//! Topics are plain strings. Payloads are `serde_json::Value` so the hub stays
//! ignorant of ticket types; the change feed bridge serializes before
//! publishing.
//!
//! Delivery is best effort: a topic with no subscribers drops the message, and
//! a subscriber that falls more than `capacity` messages behind skips ahead.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Default per-topic buffer.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish to a topic. Returns how many subscribers received it.
    pub async fn publish(&self, topic: &str, value: serde_json::Value) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to a topic, creating its channel on first use.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(topic).map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_values() {
        let hub = StreamHub::new();
        let mut first = hub.subscribe("tickets").await;
        let mut second = hub.subscribe("tickets").await;

        let event = json!({"type": "ticketChange", "change": {"seq": 1}});
        assert_eq!(hub.publish("tickets", event.clone()).await, 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_dropped() {
        let hub = StreamHub::new();
        assert_eq!(hub.publish("tickets", json!({"type": "ticketChange"})).await, 0);

        let rx = hub.subscribe("tickets").await;
        drop(rx);
        assert_eq!(hub.publish("tickets", json!({"type": "ticketChange"})).await, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let hub = StreamHub::with_capacity(2);
        let mut rx = hub.subscribe("tickets").await;
        for seq in 1..=3 {
            hub.publish("tickets", json!({ "seq": seq })).await;
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap(), json!({"seq": 2}));
    }
}
