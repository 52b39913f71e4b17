//! Reviewer assignment queries

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, opt_uuid_col, uuid_col};
use crate::error::Result;
use crate::models::{AssignmentStatus, ReviewerAssignment};
use crate::roles::Role;

fn row_to_assignment(row: &SqliteRow) -> Result<ReviewerAssignment> {
    Ok(ReviewerAssignment {
        id: uuid_col(row, "id")?,
        submission_id: uuid_col(row, "submission_id")?,
        reviewer_id: uuid_col(row, "reviewer_id")?,
        role: code_col(row, "role")?,
        status: code_col(row, "status")?,
        due_at: row.try_get("due_at")?,
        instructions: row.try_get("instructions")?,
        decline_reason: row.try_get("decline_reason")?,
        assigned_by: opt_uuid_col(row, "assigned_by")?,
        assigned_at: row.try_get("assigned_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert an assignment
///
/// Fails with a UNIQUE violation when the (submission, reviewer, role)
/// triple already exists.
pub async fn insert_assignment(
    conn: &mut SqliteConnection,
    a: &ReviewerAssignment,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reviewer_assignments
            (id, submission_id, reviewer_id, role, status, due_at, instructions,
             decline_reason, assigned_by, assigned_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(a.id.to_string())
    .bind(a.submission_id.to_string())
    .bind(a.reviewer_id.to_string())
    .bind(a.role.as_str())
    .bind(a.status.as_str())
    .bind(a.due_at)
    .bind(&a.instructions)
    .bind(&a.decline_reason)
    .bind(a.assigned_by.map(|id| id.to_string()))
    .bind(a.assigned_at)
    .bind(a.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert unless the triple exists; returns true when a row was added
pub async fn ensure_assignment(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
    reviewer_id: Uuid,
    role: Role,
    assigned_by: Uuid,
) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO reviewer_assignments
            (id, submission_id, reviewer_id, role, status, assigned_by, assigned_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(submission_id.to_string())
    .bind(reviewer_id.to_string())
    .bind(role.as_str())
    .bind(assigned_by.to_string())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_assignment(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<ReviewerAssignment>> {
    let row = sqlx::query("SELECT * FROM reviewer_assignments WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_assignment).transpose()
}

pub async fn list_for_submission(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
) -> Result<Vec<ReviewerAssignment>> {
    let rows = sqlx::query(
        "SELECT * FROM reviewer_assignments WHERE submission_id = ? ORDER BY assigned_at, role",
    )
    .bind(submission_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_assignment).collect()
}

pub async fn list_for_reviewer(
    conn: &mut SqliteConnection,
    reviewer_id: Uuid,
) -> Result<Vec<ReviewerAssignment>> {
    let rows = sqlx::query(
        "SELECT * FROM reviewer_assignments WHERE reviewer_id = ? ORDER BY due_at IS NULL, due_at, assigned_at",
    )
    .bind(reviewer_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_assignment).collect()
}

/// Compare-and-set an assignment's status; returns rows affected
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    expected: AssignmentStatus,
    new_status: AssignmentStatus,
    decline_reason: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE reviewer_assignments
        SET status = ?, decline_reason = COALESCE(?, decline_reason), updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(new_status.as_str())
    .bind(decline_reason)
    .bind(Utc::now())
    .bind(id.to_string())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Put every non-declined assignment back to pending for a new version
pub async fn reset_for_new_version(conn: &mut SqliteConnection, submission_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE reviewer_assignments
        SET status = 'pending', updated_at = ?
        WHERE submission_id = ? AND status <> 'declined'
        "#,
    )
    .bind(Utc::now())
    .bind(submission_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Drop assignments outside `keep` that have no review yet
///
/// Used when a committee is re-proposed for a submission; assignments that
/// already carry a review stay as history.
pub async fn prune_unreviewed(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
    keep: &[(Uuid, Role)],
) -> Result<u64> {
    let mut removed = 0;
    for assignment in list_for_submission(&mut *conn, submission_id).await? {
        if keep.contains(&(assignment.reviewer_id, assignment.role)) {
            continue;
        }
        let result = sqlx::query(
            r#"
            DELETE FROM reviewer_assignments
            WHERE id = ? AND NOT EXISTS (SELECT 1 FROM reviews WHERE assignment_id = ?)
            "#,
        )
        .bind(assignment.id.to_string())
        .bind(assignment.id.to_string())
        .execute(&mut *conn)
        .await?;
        removed += result.rows_affected();
    }
    Ok(removed)
}
