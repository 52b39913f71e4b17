//! Route slip queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, opt_code_col, opt_uuid_col, uuid_col};
use crate::error::Result;
use crate::models::{RouteSlip, Verdict};

fn row_to_route_slip(row: &SqliteRow) -> Result<RouteSlip> {
    Ok(RouteSlip {
        id: uuid_col(row, "id")?,
        submission_id: uuid_col(row, "submission_id")?,
        manuscript_id: uuid_col(row, "manuscript_id")?,
        student_id: uuid_col(row, "student_id")?,
        adviser_id: uuid_col(row, "adviser_id")?,
        course: row.try_get("course")?,
        panel_member: row.try_get("panel_member")?,
        action_taken: code_col(row, "action_taken")?,
        overall_decision: opt_code_col(row, "overall_decision")?,
        overall_notes: row.try_get("overall_notes")?,
        decided_by: opt_uuid_col(row, "decided_by")?,
        decided_at: row.try_get("decided_at")?,
        adviser_signature_path: row.try_get("adviser_signature_path")?,
        adviser_signed_at: row.try_get("adviser_signed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_route_slip(conn: &mut SqliteConnection, r: &RouteSlip) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_slips
            (id, submission_id, manuscript_id, student_id, adviser_id, course, panel_member,
             action_taken, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(r.id.to_string())
    .bind(r.submission_id.to_string())
    .bind(r.manuscript_id.to_string())
    .bind(r.student_id.to_string())
    .bind(r.adviser_id.to_string())
    .bind(&r.course)
    .bind(&r.panel_member)
    .bind(r.action_taken.as_str())
    .bind(r.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_route_slip(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<RouteSlip>> {
    let row = sqlx::query("SELECT * FROM route_slips WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_route_slip).transpose()
}

/// Route slip whose own submission row is `submission_id`
pub async fn get_by_submission(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
) -> Result<Option<RouteSlip>> {
    let row = sqlx::query("SELECT * FROM route_slips WHERE submission_id = ?")
        .bind(submission_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_route_slip).transpose()
}

/// Newest route slip issued for a manuscript
pub async fn latest_for_manuscript(
    conn: &mut SqliteConnection,
    manuscript_id: Uuid,
) -> Result<Option<RouteSlip>> {
    let row = sqlx::query(
        "SELECT * FROM route_slips WHERE manuscript_id = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(manuscript_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_route_slip).transpose()
}

/// Record the adviser's final signature once; returns rows affected
pub async fn set_adviser_signature(
    conn: &mut SqliteConnection,
    id: Uuid,
    signature_path: &str,
    signed_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE route_slips SET adviser_signature_path = ?, adviser_signed_at = ?
        WHERE id = ? AND adviser_signature_path IS NULL
        "#,
    )
    .bind(signature_path)
    .bind(signed_at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Record the overall committee decision
///
/// Succeeds when no decision is recorded yet or the same decision is
/// re-applied; returns rows affected.
pub async fn set_overall_decision(
    conn: &mut SqliteConnection,
    id: Uuid,
    decision: Verdict,
    notes: Option<&str>,
    decided_by: Uuid,
    decided_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE route_slips
        SET overall_decision = ?, overall_notes = COALESCE(?, overall_notes),
            decided_by = ?, decided_at = COALESCE(decided_at, ?)
        WHERE id = ? AND (overall_decision IS NULL OR overall_decision = ?)
        "#,
    )
    .bind(decision.as_str())
    .bind(notes)
    .bind(decided_by.to_string())
    .bind(decided_at)
    .bind(id.to_string())
    .bind(decision.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
