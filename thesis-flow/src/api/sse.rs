//! Server-Sent Events for workflow updates

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Only forward notifications addressed to this user
    pub user_id: Option<Uuid>,
}

/// GET /api/events
///
/// Streams Notification, SubmissionStatusChanged, CommitteeRequestDecided,
/// RouteSlipFullySigned and NoticeToCommenceCreated events.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    thesis_common::sse::create_event_sse_stream("thesis-flow", state.events.clone(), query.user_id)
}
