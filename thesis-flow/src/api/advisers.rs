//! Adviser assignment endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use crate::actor::Actor;
use crate::workflow::AdviserExclusivity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignAdviserRequest {
    pub student_id: Uuid,
    pub adviser_id: Uuid,
    /// Move the student to this adviser if already linked elsewhere
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelfAssignRequest {
    pub adviser_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// POST /api/advisers/assign
pub async fn assign_adviser(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<AssignAdviserRequest>,
) -> ApiResult<Json<Value>> {
    let exclusivity = if body.replace {
        AdviserExclusivity::Replace
    } else {
        AdviserExclusivity::Required
    };
    let link = state
        .engine
        .assign_adviser(&actor, body.student_id, body.adviser_id, exclusivity)
        .await?;
    Ok(Json(json!({ "success": true, "link": link })))
}

/// POST /api/advisers/self-assign
pub async fn self_assign_adviser(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<SelfAssignRequest>,
) -> ApiResult<Json<Value>> {
    let link = state.engine.self_assign_adviser(&actor, body.adviser_id).await?;
    Ok(Json(json!({ "success": true, "link": link })))
}

/// DELETE /api/advisers/:student_id
pub async fn unassign_adviser(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(student_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let previous = state.engine.unassign_adviser(&actor, student_id).await?;
    Ok(Json(json!({
        "success": true,
        "student_id": student_id,
        "previous_adviser_id": previous,
    })))
}

/// GET /api/students/unassigned?page=N
pub async fn list_unassigned_students(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = state.engine.list_unassigned_students(&actor, query.page).await?;
    Ok(Json(json!({ "success": true, "students": page })))
}

pub fn adviser_routes() -> Router<AppState> {
    Router::new()
        .route("/api/advisers/assign", post(assign_adviser))
        .route("/api/advisers/self-assign", post(self_assign_adviser))
        .route("/api/advisers/:student_id", delete(unassign_adviser))
        .route("/api/students/unassigned", get(list_unassigned_students))
}
