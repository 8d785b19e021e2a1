//! SSE change feed.
//!
//! GET /api/tickets/stream
//!
//! Sends a `connected` event, then one `ticketChange` event per change the
//! bridge publishes. Nothing is replayed for late subscribers; a subscriber
//! that falls behind gets a `lagged` event with the number of missed changes.

use std::convert::Infallible;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use crate::domains::tickets::TICKET_CHANGES_TOPIC;
use crate::server::app::AppState;

/// Logs the disconnect when the SSE response body is dropped.
struct SubscriberGuard {
    id: Uuid,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        info!(subscriber_id = %self.id, "Change feed subscriber disconnected");
    }
}

pub async fn ticket_stream_handler(
    Extension(state): Extension<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.deps.stream_hub.subscribe(TICKET_CHANGES_TOPIC).await;
    let guard = SubscriberGuard { id: Uuid::new_v4() };
    info!(subscriber_id = %guard.id, "Change feed subscriber connected");

    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(move |result| {
        // Moving the guard in ties its lifetime to the stream.
        let _guard = &guard;
        let event = match result {
            Ok(value) => {
                let event_name = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("message")
                    .to_string();
                Event::default().event(event_name).json_data(&value).ok()
            }
            Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                Event::default()
                    .event("lagged")
                    .json_data(serde_json::json!({ "missed": n }))
                    .ok()
            }
        };
        async move { event.map(Ok) }
    });

    Sse::new(connected.chain(events)).keep_alive(KeepAlive::default())
}
