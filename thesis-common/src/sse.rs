//! Server-Sent Events (SSE) utilities
//!
//! Streams workflow events from the EventBus to connected clients.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Create an SSE stream of workflow events
///
/// When `user_filter` is set, events addressed to other users are skipped;
/// broadcast events (status changes, decisions) are always forwarded.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     thesis_common::sse::create_event_sse_stream("thesis-flow", state.events.clone(), None)
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: Arc<EventBus>,
    user_filter: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} workflow events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let (Some(filter), Some(recipient)) = (user_filter, event.recipient()) {
                        if filter != recipient {
                            continue;
                        }
                    }
                    match serde_json::to_string(&event) {
                        Ok(data) => {
                            yield Ok(Event::default().event(event.event_type()).data(data));
                        }
                        Err(e) => warn!("SSE: failed to serialize event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("SSE: client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
