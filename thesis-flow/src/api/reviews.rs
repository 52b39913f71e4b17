//! Reviewer assignment endpoints

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::{decode_optional, FilePayload};
use crate::actor::Actor;
use crate::workflow::ReviewInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub verdict: String,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub rank_order: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub signature: Option<FilePayload>,
}

#[derive(Debug, Deserialize)]
pub struct DeclineRequest {
    pub reason: String,
}

/// GET /api/assignments
pub async fn list_my_assignments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Value>> {
    let assignments = state.engine.list_my_assignments(&actor).await?;
    Ok(Json(json!({ "success": true, "assignments": assignments })))
}

/// POST /api/assignments/:id/start
pub async fn start_review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let assignment = state.engine.start_review(&actor, assignment_id).await?;
    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

/// POST /api/assignments/:id/review
pub async fn record_review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(assignment_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    let input = ReviewInput {
        verdict: body.verdict,
        comments: body.comments,
        rank_order: body.rank_order,
        score: body.score,
        signature: decode_optional(body.signature)?,
    };
    let outcome = state.engine.record_review(&actor, assignment_id, input).await?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}

/// POST /api/assignments/:id/decline
pub async fn decline_assignment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(assignment_id): Path<Uuid>,
    Json(body): Json<DeclineRequest>,
) -> ApiResult<Json<Value>> {
    let assignment = state
        .engine
        .record_decline_feedback(&actor, assignment_id, &body.reason)
        .await?;
    Ok(Json(json!({ "success": true, "assignment": assignment })))
}

/// DELETE /api/assignments/:id/signature
pub async fn clear_signature(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let outcome = state.engine.clear_signature(&actor, assignment_id).await?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assignments", get(list_my_assignments))
        .route("/api/assignments/:id/start", post(start_review))
        .route("/api/assignments/:id/review", post(record_review))
        .route("/api/assignments/:id/decline", post(decline_assignment))
        .route("/api/assignments/:id/signature", delete(clear_signature))
}
