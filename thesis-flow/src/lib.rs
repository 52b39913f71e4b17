//! thesis-flow library - thesis advising workflow service
//!
//! Routes concept papers, outline defense manuscripts, route slips and
//! hardbound copies from students through advisers, panels and
//! administrators. The [`workflow::WorkflowEngine`] carries the rules; the
//! [`api`] module exposes them over HTTP.

use axum::Router;
use std::sync::Arc;
use thesis_common::EventBus;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod actor;
pub mod api;
pub mod blob;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod roles;
pub mod scope;
pub mod workflow;

use workflow::WorkflowEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    /// Event bus feeding the SSE stream
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn new(engine: WorkflowEngine, events: Arc<EventBus>) -> Self {
        Self {
            engine: Arc::new(engine),
            events,
        }
    }
}

/// Build application router
///
/// Health, build info, registration and the event stream are public.
/// Everything else requires an `X-Actor-Id` header naming a known user.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let protected = Router::new()
        .merge(api::user_routes())
        .merge(api::adviser_routes())
        .merge(api::submission_routes())
        .merge(api::review_routes())
        .merge(api::committee_routes())
        .merge(api::route_slip_routes())
        .merge(api::notification_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::actor_middleware,
        ));

    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/events", get(api::event_stream))
        .merge(api::registration_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
