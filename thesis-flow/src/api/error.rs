//! HTTP mapping of workflow errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::WorkflowError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unknown acting user (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request body or query could not be understood (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// HTTP status for each workflow failure
pub fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Validation(_) | WorkflowError::InvalidVerdict(_) => StatusCode::BAD_REQUEST,
        WorkflowError::OutOfScope(_)
        | WorkflowError::MissingCapability(_)
        | WorkflowError::NotAssigned(_) => StatusCode::FORBIDDEN,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::AlreadyDecided(_)
        | WorkflowError::StateChanged(_)
        | WorkflowError::AlreadyAssigned(_)
        | WorkflowError::SignaturesPending(_) => StatusCode::CONFLICT,
        WorkflowError::DuplicateMember(_)
        | WorkflowError::IneligibleMember(_)
        | WorkflowError::ScheduleConflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, detail, retryable) = match &self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Sign in to continue.",
                msg.clone(),
                false,
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "The request could not be understood.",
                msg.clone(),
                false,
            ),
            ApiError::Workflow(err) => (
                status_for(err),
                err.code(),
                err.user_message(),
                err.to_string(),
                err.is_retryable(),
            ),
        };

        if status.is_server_error() {
            error!("{}", detail);
        } else {
            warn!("Request rejected ({}): {}", code, detail);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
                "detail": detail,
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let conflict = WorkflowError::ScheduleConflict("AVR 2".into());
        assert_eq!(status_for(&conflict), StatusCode::UNPROCESSABLE_ENTITY);
        let decided = WorkflowError::AlreadyDecided("request".into());
        assert_eq!(status_for(&decided), StatusCode::CONFLICT);
        let scope = WorkflowError::OutOfScope("student".into());
        assert_eq!(status_for(&scope), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_error_body_carries_code_and_message() {
        let response = ApiError::from(WorkflowError::ScheduleConflict("AVR 2".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "SCHEDULE_CONFLICT");
        assert_eq!(
            body["error"]["message"],
            "Another defense is already booked at this venue for an overlapping time."
        );
    }
}
