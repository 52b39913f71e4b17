//! Database queries
//!
//! Every function takes `&mut SqliteConnection` so it can run either on a
//! pooled connection or inside a workflow transaction. Ids are stored as
//! TEXT and timestamps as RFC 3339 text.

pub mod advisers;
pub mod assignments;
pub mod committee;
pub mod notices;
pub mod notifications;
pub mod reviews;
pub mod route_slips;
pub mod submissions;
pub mod users;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{Result, WorkflowError};

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| WorkflowError::StorageFailure(format!("corrupt id '{}': {}", value, e)))
}

pub(crate) fn uuid_col(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    parse_uuid(&value)
}

pub(crate) fn opt_uuid_col(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_uuid).transpose()
}

/// Parse a stored enum code, treating unknown values as corruption
pub(crate) fn code_col<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = WorkflowError>,
{
    let value: String = row.try_get(column)?;
    value
        .parse()
        .map_err(|e: WorkflowError| WorkflowError::StorageFailure(format!("column {}: {}", column, e)))
}

pub(crate) fn opt_code_col<T>(row: &SqliteRow, column: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = WorkflowError>,
{
    let value: Option<String> = row.try_get(column)?;
    value
        .as_deref()
        .map(|v| {
            v.parse().map_err(|e: WorkflowError| {
                WorkflowError::StorageFailure(format!("column {}: {}", column, e))
            })
        })
        .transpose()
}
