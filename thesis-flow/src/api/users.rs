//! User registration and role grants

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use crate::actor::Actor;
use crate::models::NewUser;
use crate::roles::Role;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub role: Role,
}

/// POST /api/users
pub async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = state.engine.register_user(body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

/// GET /api/me
pub async fn current_actor(Extension(actor): Extension<Actor>) -> Json<Value> {
    Json(json!({ "success": true, "actor": actor, "scope": actor.scope() }))
}

/// POST /api/users/:id/roles
pub async fn grant_role(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<GrantRoleRequest>,
) -> ApiResult<Json<Value>> {
    actor.require_any(&[Role::ProgramChairperson, Role::Dean])?;
    let granted = state.engine.grant_role(user_id, body.role).await?;
    Ok(Json(json!({ "success": true, "granted": granted })))
}

/// Routes usable before any user exists
pub fn registration_routes() -> Router<AppState> {
    Router::new().route("/api/users", post(register_user))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(current_actor))
        .route("/api/users/:id/roles", post(grant_role))
}
