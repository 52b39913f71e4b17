//! Committee request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::actor::Actor;
use crate::models::{DecisionStatus, MemoFields};
use crate::workflow::{CommitteeDecision, CommitteeProposal};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct CommitteeDecisionRequest {
    pub decision: DecisionAction,
    #[serde(default)]
    pub memo: Option<MemoFields>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CommitteeDecisionRequest {
    fn into_decision(self) -> Result<CommitteeDecision, ApiError> {
        match self.decision {
            DecisionAction::Approve => self
                .memo
                .map(CommitteeDecision::Approve)
                .ok_or_else(|| ApiError::BadRequest("approval requires a memo".to_string())),
            DecisionAction::Reject => Ok(CommitteeDecision::Reject {
                reason: self.reason,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<DecisionStatus>,
}

/// POST /api/committee-requests
pub async fn create_committee_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CommitteeProposal>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = state.engine.create_committee_request(&actor, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "request": request })),
    ))
}

/// GET /api/committee-requests?status=pending
pub async fn list_committee_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let requests = state
        .engine
        .list_committee_requests(&actor, query.status)
        .await?;
    Ok(Json(json!({ "success": true, "requests": requests })))
}

/// POST /api/committee-requests/:id/decision
pub async fn decide_committee_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<CommitteeDecisionRequest>,
) -> ApiResult<Json<Value>> {
    let decision = body.into_decision()?;
    let request = state
        .engine
        .decide_committee_request(&actor, request_id, decision)
        .await?;
    Ok(Json(json!({ "success": true, "request": request })))
}

/// GET /api/calendar
pub async fn calendar(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Value>> {
    let entries = state.engine.calendar(&actor).await?;
    Ok(Json(json!({ "success": true, "entries": entries })))
}

pub fn committee_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/committee-requests",
            post(create_committee_request).get(list_committee_requests),
        )
        .route(
            "/api/committee-requests/:id/decision",
            post(decide_committee_request),
        )
        .route("/api/calendar", get(calendar))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_without_memo_is_rejected() {
        let request: CommitteeDecisionRequest =
            serde_json::from_value(json!({ "decision": "approve" })).unwrap();
        assert!(matches!(request.into_decision(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_rejection_carries_reason() {
        let request: CommitteeDecisionRequest =
            serde_json::from_value(json!({ "decision": "reject", "reason": "venue unavailable" }))
                .unwrap();
        match request.into_decision().unwrap() {
            CommitteeDecision::Reject { reason } => {
                assert_eq!(reason.as_deref(), Some("venue unavailable"))
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
