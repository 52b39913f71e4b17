//! Notice to Commence queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, opt_uuid_col, uuid_col};
use crate::error::{Result, WorkflowError};
use crate::models::NoticeToCommence;

fn row_to_notice(row: &SqliteRow) -> Result<NoticeToCommence> {
    let fields: String = row.try_get("fields")?;
    let fields = serde_json::from_str(&fields)
        .map_err(|e| WorkflowError::StorageFailure(format!("corrupt notice fields: {}", e)))?;

    Ok(NoticeToCommence {
        id: uuid_col(row, "id")?,
        submission_id: uuid_col(row, "submission_id")?,
        student_id: uuid_col(row, "student_id")?,
        program_chair_id: opt_uuid_col(row, "program_chair_id")?,
        status: code_col(row, "status")?,
        fields,
        created_at: row.try_get("created_at")?,
        forwarded_at: row.try_get("forwarded_at")?,
    })
}

/// Pending or approved notice for a submission, if any
pub async fn live_for_submission(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
) -> Result<Option<NoticeToCommence>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM notices_to_commence
        WHERE submission_id = ? AND status IN ('pending', 'approved')
        LIMIT 1
        "#,
    )
    .bind(submission_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_notice).transpose()
}

/// Insert a notice
///
/// A second live notice for the same submission fails with a UNIQUE
/// violation (partial index `idx_notices_live_submission`).
pub async fn insert_notice(
    conn: &mut SqliteConnection,
    n: &NoticeToCommence,
) -> std::result::Result<(), sqlx::Error> {
    let fields = serde_json::to_string(&n.fields)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO notices_to_commence
            (id, submission_id, student_id, program_chair_id, status, fields, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(n.id.to_string())
    .bind(n.submission_id.to_string())
    .bind(n.student_id.to_string())
    .bind(n.program_chair_id.map(|id| id.to_string()))
    .bind(n.status.as_str())
    .bind(fields)
    .bind(n.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_notice(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<NoticeToCommence>> {
    let row = sqlx::query("SELECT * FROM notices_to_commence WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_notice).transpose()
}

/// Approve and forward a pending notice; returns rows affected
pub async fn forward_notice(
    conn: &mut SqliteConnection,
    id: Uuid,
    forwarded_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE notices_to_commence SET status = 'approved', forwarded_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(forwarded_at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_for_submission(conn: &mut SqliteConnection, submission_id: Uuid) -> Result<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM notices_to_commence WHERE submission_id = ?")
            .bind(submission_id.to_string())
            .fetch_one(&mut *conn)
            .await?,
    )
}
