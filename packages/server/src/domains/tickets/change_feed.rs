//! Change feed bridge: store mutation log -> `StreamHub`.
//!
//! ```text
//! TicketStore::watch ──► ChangeFeedBridge ──► StreamHub("tickets") ──► SSE clients
//!        ▲                      │
//!        └── changes_since ◄────┘  (catch-up after re-subscribing)
//! ```
//!
//! The bridge is the only publisher of ticket events. It remembers the last
//! `seq` it forwarded, so after a dropped watch it replays what it missed and
//! drops duplicates the new watch delivers again.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::errors::StoreError;
use super::models::TicketChange;
use super::store::{ChangeStream, TicketStore};
use crate::kernel::StreamHub;

/// Hub topic carrying ticket changes.
pub const TICKET_CHANGES_TOPIC: &str = "tickets";

/// Event `type` of a forwarded change, also used as the SSE event name.
pub const TICKET_CHANGE_EVENT: &str = "ticketChange";

/// Re-subscription delays.
#[derive(Debug, Clone)]
pub struct ChangeFeedConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ChangeFeedConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// How a spawned bridge task came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    Panicked,
    Cancelled,
    Returned,
}

/// Wait for a spawned bridge task to finish and log why it did.
///
/// The bridge loops forever, so any return here means the change feed is down.
pub async fn supervise(handle: &mut JoinHandle<()>) -> BridgeExit {
    match handle.await {
        Err(e) if e.is_panic() => {
            error!(error = %e, "Change feed bridge panicked");
            BridgeExit::Panicked
        }
        Err(e) => {
            warn!(error = %e, "Change feed bridge cancelled");
            BridgeExit::Cancelled
        }
        Ok(()) => {
            error!("Change feed bridge returned");
            BridgeExit::Returned
        }
    }
}

pub struct ChangeFeedBridge {
    store: Arc<dyn TicketStore>,
    hub: StreamHub,
    config: ChangeFeedConfig,
    last_seq: Option<i64>,
    backoff: Duration,
}

impl ChangeFeedBridge {
    pub fn new(store: Arc<dyn TicketStore>, hub: StreamHub) -> Self {
        Self::with_config(store, hub, ChangeFeedConfig::default())
    }

    pub fn with_config(store: Arc<dyn TicketStore>, hub: StreamHub, config: ChangeFeedConfig) -> Self {
        Self {
            store,
            hub,
            backoff: config.initial_backoff,
            config,
            last_seq: None,
        }
    }

    /// Subscribe to the store and run the bridge for the life of the process.
    ///
    /// The first subscription happens before this returns, so every change
    /// committed afterwards is forwarded. If it fails the task keeps retrying.
    pub async fn spawn(store: Arc<dyn TicketStore>, hub: StreamHub) -> JoinHandle<()> {
        Self::new(store, hub).start().await
    }

    pub async fn start(mut self) -> JoinHandle<()> {
        let initial = match self.subscribe().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "Initial ticket change subscription failed, will retry");
                None
            }
        };
        tokio::spawn(self.run(initial))
    }

    async fn run(mut self, mut pending: Option<ChangeStream>) {
        info!(topic = TICKET_CHANGES_TOPIC, "Change feed bridge started");
        loop {
            let stream = match pending.take() {
                Some(stream) => stream,
                None => match self.subscribe().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, retry_in = ?self.backoff, "Ticket change subscription failed");
                        self.wait().await;
                        continue;
                    }
                },
            };
            self.backoff = self.config.initial_backoff;

            self.forward(stream).await;
            self.wait().await;
        }
    }

    /// Open a watch, then replay anything committed since the last forwarded change.
    ///
    /// The first call records the log's high-water mark before opening the
    /// watch. Changes older than that are history and never published; any
    /// change after it reaches subscribers even if the first watch dies early.
    async fn subscribe(&mut self) -> Result<ChangeStream, StoreError> {
        let last = match self.last_seq {
            Some(last) => last,
            None => {
                let high_water = self.store.latest_seq().await?;
                self.last_seq = Some(high_water);
                high_water
            }
        };

        let stream = self.store.watch().await?;
        let missed = self.store.changes_since(last).await?;
        if !missed.is_empty() {
            info!(count = missed.len(), after_seq = last, "Replaying missed ticket changes");
        }
        for change in missed {
            self.publish(change).await;
        }
        debug!(last_seq = ?self.last_seq, "Subscribed to ticket changes");
        Ok(stream)
    }

    async fn forward(&mut self, mut stream: ChangeStream) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(change) => self.publish(change).await,
                Err(e) => {
                    warn!(error = %e, last_seq = ?self.last_seq, "Ticket change stream interrupted");
                    return;
                }
            }
        }
        warn!(last_seq = ?self.last_seq, "Ticket change stream ended");
    }

    async fn publish(&mut self, change: TicketChange) {
        if self.last_seq.is_some_and(|last| change.seq <= last) {
            return;
        }
        self.last_seq = Some(change.seq);

        let seq = change.seq;
        match serde_json::to_value(&change) {
            Ok(payload) => {
                let event = json!({ "type": TICKET_CHANGE_EVENT, "change": payload });
                let delivered = self.hub.publish(TICKET_CHANGES_TOPIC, event).await;
                debug!(seq, ticket_id = %change.ticket_id, delivered, "Forwarded ticket change");
            }
            Err(e) => error!(seq, error = %e, "Failed to serialize ticket change"),
        }
    }

    async fn wait(&mut self) {
        tokio::time::sleep(self.backoff).await;
        self.backoff = (self.backoff * 2).min(self.config.max_backoff);
    }
}
