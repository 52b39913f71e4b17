//! Route slip and Notice to Commence endpoints

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
use super::submissions::DecisionRequest;
use super::FilePayload;
use crate::actor::Actor;
use crate::workflow::RouteSlipForm;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueRouteSlipRequest {
    pub manuscript_id: Uuid,
    pub course: String,
    #[serde(default)]
    pub panel_member: Option<String>,
    pub action_taken: String,
    pub file: FilePayload,
}

#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    pub signature: FilePayload,
}

/// POST /api/route-slips
pub async fn issue_route_slip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<IssueRouteSlipRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = RouteSlipForm {
        manuscript_id: body.manuscript_id,
        course: body.course,
        panel_member: body.panel_member,
        action_taken: body.action_taken,
        upload: body.file.decode()?,
    };
    let slip = state.engine.issue_route_slip(&actor, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "route_slip": slip })),
    ))
}

/// GET /api/route-slips/:id
pub async fn get_route_slip(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(route_slip_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let (slip, fully_signed) = state.engine.route_slip(&actor, route_slip_id).await?;
    Ok(Json(json!({
        "success": true,
        "route_slip": slip,
        "fully_signed": fully_signed,
    })))
}

/// POST /api/route-slips/:id/adviser-signature
pub async fn apply_adviser_signature(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(route_slip_id): Path<Uuid>,
    Json(body): Json<SignatureRequest>,
) -> ApiResult<Json<Value>> {
    let signature = body.signature.decode()?;
    let slip = state
        .engine
        .apply_adviser_signature(&actor, route_slip_id, signature)
        .await?;
    Ok(Json(json!({ "success": true, "route_slip": slip })))
}

/// POST /api/submissions/:id/overall-decision
///
/// The id may name the manuscript or its route slip.
pub async fn record_overall_decision(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
    Json(body): Json<DecisionRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .engine
        .record_route_slip_overall_decision(
            &actor,
            submission_id,
            &body.decision,
            body.notes.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}

/// GET /api/notices/:id
pub async fn view_notice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(notice_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let (notice, rendered) = state.engine.view_notice(&actor, notice_id).await?;
    Ok(Json(json!({
        "success": true,
        "notice": notice,
        "rendered": rendered,
    })))
}

/// POST /api/notices/:id/forward
pub async fn forward_notice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(notice_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let notice = state.engine.forward_notice(&actor, notice_id).await?;
    Ok(Json(json!({ "success": true, "notice": notice })))
}

pub fn route_slip_routes() -> Router<AppState> {
    Router::new()
        .route("/api/route-slips", post(issue_route_slip))
        .route("/api/route-slips/:id", get(get_route_slip))
        .route(
            "/api/route-slips/:id/adviser-signature",
            post(apply_adviser_signature),
        )
        .route(
            "/api/submissions/:id/overall-decision",
            post(record_overall_decision),
        )
        .route("/api/notices/:id", get(view_notice))
        .route("/api/notices/:id/forward", post(forward_notice))
}
