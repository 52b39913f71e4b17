//! Acting-user middleware
//!
//! Every protected request names its acting user in the `X-Actor-Id`
//! header. The user is loaded with roles and affiliation and handed to
//! handlers as an `Extension<Actor>`. This is identity assertion only;
//! credentials are checked upstream.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use super::error::ApiError;
use crate::error::WorkflowError;
use crate::AppState;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Resolve the acting user and attach it to the request
pub async fn actor_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-Actor-Id header".to_string()))?;

    let user_id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::Unauthorized(format!("'{}' is not a user id", raw)))?;

    let actor = match state.engine.load_actor(user_id).await {
        Ok(actor) => actor,
        Err(WorkflowError::NotFound(_)) => {
            return Err(ApiError::Unauthorized(format!("unknown user {}", user_id)))
        }
        Err(e) => return Err(e.into()),
    };

    debug!(
        "{} {} as {}",
        request.method(),
        request.uri().path(),
        actor.id
    );
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
