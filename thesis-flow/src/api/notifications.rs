//! In-app notification endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use crate::actor::Actor;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/notifications?unread_only=true
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    let notifications = state
        .engine
        .list_notifications(&actor, query.unread_only)
        .await?;
    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

/// POST /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state
        .engine
        .mark_notification_read(&actor, notification_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", post(mark_notification_read))
}
