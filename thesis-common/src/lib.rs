//! # Thesis Common Library
//!
//! Shared code for the thesis advising workflow service including:
//! - Database initialization, schema and migrations
//! - Workflow event types and the EventBus
//! - Configuration loading and root folder resolution
//! - SSE helpers and time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, WorkflowEvent};
