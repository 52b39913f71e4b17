//! Submission store endpoints plus hardbound verification

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::{decode_optional, FilePayload};
use crate::actor::Actor;
use crate::db::submissions::SubmissionFilter;
use crate::models::{SubmissionKind, SubmissionStatus};
use crate::roles::Role;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub kind: SubmissionKind,
    pub title: String,
    pub file: FilePayload,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file: Option<FilePayload>,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionListQuery {
    pub kind: Option<SubmissionKind>,
    pub status: Option<SubmissionStatus>,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignReviewerRequest {
    pub reviewer_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/submissions
pub async fn submit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let upload = body.file.decode()?;
    let submission = state
        .engine
        .submit(&actor, body.kind, &body.title, upload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "submission": submission })),
    ))
}

/// GET /api/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SubmissionListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = SubmissionFilter {
        kind: query.kind,
        status: query.status,
        student_id: query.student_id,
    };
    let submissions = state.engine.fetch_submissions_for_actor(&actor, filter).await?;
    Ok(Json(json!({
        "success": true,
        "count": submissions.len(),
        "submissions": submissions,
    })))
}

/// GET /api/submissions/:id
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let detail = state.engine.submission_detail(&actor, submission_id).await?;
    Ok(Json(json!({ "success": true, "detail": detail })))
}

/// POST /api/submissions/:id/resubmit
pub async fn resubmit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
    Json(body): Json<ResubmitRequest>,
) -> ApiResult<Json<Value>> {
    let upload = decode_optional(body.file)?;
    let submission = state
        .engine
        .resubmit(&actor, submission_id, body.title.as_deref(), upload)
        .await?;
    Ok(Json(json!({ "success": true, "submission": submission })))
}

/// GET /api/submissions/:id/history
pub async fn submission_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let (submission, versions) = state.engine.submission_history(&actor, submission_id).await?;
    Ok(Json(json!({
        "success": true,
        "submission": submission,
        "versions": versions,
    })))
}

/// POST /api/submissions/:id/reviewers
pub async fn assign_reviewer(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
    Json(body): Json<AssignReviewerRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let assignment = state
        .engine
        .assign_reviewer(
            &actor,
            submission_id,
            body.reviewer_id,
            body.role,
            body.due_at,
            body.instructions,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "assignment": assignment })),
    ))
}

/// POST /api/submissions/:id/verify
pub async fn verify_hardbound(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(submission_id): Path<Uuid>,
    Json(body): Json<DecisionRequest>,
) -> ApiResult<Json<Value>> {
    let submission = state
        .engine
        .verify_hardbound(&actor, submission_id, &body.decision, body.notes.as_deref())
        .await?;
    Ok(Json(json!({ "success": true, "submission": submission })))
}

/// GET /api/students/:id/concept-rankings
pub async fn concept_paper_rankings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(student_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let rankings = state.engine.concept_paper_rankings(&actor, student_id).await?;
    Ok(Json(json!({ "success": true, "rankings": rankings })))
}

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", post(submit).get(list_submissions))
        .route("/api/submissions/:id", get(get_submission))
        .route("/api/submissions/:id/resubmit", post(resubmit))
        .route("/api/submissions/:id/history", get(submission_history))
        .route("/api/submissions/:id/reviewers", post(assign_reviewer))
        .route("/api/submissions/:id/verify", post(verify_hardbound))
        .route(
            "/api/students/:id/concept-rankings",
            get(concept_paper_rankings),
        )
}
