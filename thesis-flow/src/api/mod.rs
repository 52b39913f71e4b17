//! HTTP API
//!
//! Thin axum layer over [`crate::workflow::WorkflowEngine`]. Handlers decode
//! the request, call one engine operation and wrap the result in a
//! `{"success": true, ...}` envelope. Uploaded files travel as base64 inside
//! the JSON body.

pub mod actor;
pub mod advisers;
pub mod buildinfo;
pub mod committee;
pub mod error;
pub mod health;
pub mod notifications;
pub mod reviews;
pub mod route_slips;
pub mod sse;
pub mod submissions;
pub mod users;

pub use actor::{actor_middleware, ACTOR_HEADER};
pub use advisers::adviser_routes;
pub use buildinfo::get_build_info;
pub use committee::committee_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use notifications::notification_routes;
pub use reviews::review_routes;
pub use route_slips::route_slip_routes;
pub use sse::event_stream;
pub use submissions::submission_routes;
pub use users::{registration_routes, user_routes};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::blob::FileUpload;

/// File carried inline in a JSON request
#[derive(Debug, Clone, Deserialize)]
pub struct FilePayload {
    pub file_name: String,
    pub content_base64: String,
}

impl FilePayload {
    pub fn decode(self) -> ApiResult<FileUpload> {
        let bytes = STANDARD
            .decode(self.content_base64.trim())
            .map_err(|e| ApiError::BadRequest(format!("file '{}' is not valid base64: {}", self.file_name, e)))?;
        Ok(FileUpload::new(self.file_name, bytes))
    }
}

/// Decode an optional inline file
pub fn decode_optional(file: Option<FilePayload>) -> ApiResult<Option<FileUpload>> {
    file.map(FilePayload::decode).transpose()
}
