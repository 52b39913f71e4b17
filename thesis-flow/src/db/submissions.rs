//! Submission and version-history queries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{code_col, uuid_col};
use crate::error::Result;
use crate::models::{Submission, SubmissionKind, SubmissionStatus, SubmissionVersion};
use crate::scope::ScopePredicate;

fn row_to_submission(row: &SqliteRow) -> Result<Submission> {
    Ok(Submission {
        id: uuid_col(row, "id")?,
        student_id: uuid_col(row, "student_id")?,
        kind: code_col(row, "kind")?,
        title: row.try_get("title")?,
        file_path: row.try_get("file_path")?,
        status: code_col(row, "status")?,
        version: row.try_get("version")?,
        submitted_at: row.try_get("submitted_at")?,
        reviewed_at: row.try_get("reviewed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert_submission(conn: &mut SqliteConnection, s: &Submission) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO submissions
            (id, student_id, kind, title, file_path, status, version, submitted_at, reviewed_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(s.id.to_string())
    .bind(s.student_id.to_string())
    .bind(s.kind.as_str())
    .bind(&s.title)
    .bind(&s.file_path)
    .bind(s.status.as_str())
    .bind(s.version)
    .bind(s.submitted_at)
    .bind(s.reviewed_at)
    .bind(s.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_submission(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Submission>> {
    let row = sqlx::query("SELECT * FROM submissions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_submission).transpose()
}

/// Compare-and-set the cached status; returns rows affected
///
/// `reviewed_at` is stamped whenever the new status is a review outcome.
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    expected: SubmissionStatus,
    new_status: SubmissionStatus,
) -> Result<u64> {
    let now = Utc::now();
    let reviewed = !matches!(
        new_status,
        SubmissionStatus::Submitted | SubmissionStatus::UnderReview
    );

    let result = sqlx::query(
        r#"
        UPDATE submissions
        SET status = ?, updated_at = ?,
            reviewed_at = CASE WHEN ? THEN ? ELSE reviewed_at END
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(new_status.as_str())
    .bind(now)
    .bind(reviewed)
    .bind(now)
    .bind(id.to_string())
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Copy the current row into the version history before it is replaced
pub async fn archive_version(
    conn: &mut SqliteConnection,
    s: &Submission,
    superseded_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO submission_versions
            (submission_id, version, title, file_path, status, submitted_at, superseded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(s.id.to_string())
    .bind(s.version)
    .bind(&s.title)
    .bind(&s.file_path)
    .bind(s.status.as_str())
    .bind(s.submitted_at)
    .bind(superseded_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace the current version, guarded on the version and status read
///
/// Returns rows affected; zero means a concurrent writer got there first.
pub async fn replace_version(
    conn: &mut SqliteConnection,
    previous: &Submission,
    next: &Submission,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE submissions
        SET title = ?, file_path = ?, status = ?, version = ?,
            submitted_at = ?, reviewed_at = NULL, updated_at = ?
        WHERE id = ? AND version = ? AND status = ?
        "#,
    )
    .bind(&next.title)
    .bind(&next.file_path)
    .bind(next.status.as_str())
    .bind(next.version)
    .bind(next.submitted_at)
    .bind(next.updated_at)
    .bind(previous.id.to_string())
    .bind(previous.version)
    .bind(previous.status.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn list_versions(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
) -> Result<Vec<SubmissionVersion>> {
    let rows = sqlx::query(
        "SELECT * FROM submission_versions WHERE submission_id = ? ORDER BY version",
    )
    .bind(submission_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SubmissionVersion {
                submission_id: uuid_col(row, "submission_id")?,
                version: row.try_get("version")?,
                title: row.try_get("title")?,
                file_path: row.try_get("file_path")?,
                status: code_col(row, "status")?,
                submitted_at: row.try_get("submitted_at")?,
                superseded_at: row.try_get("superseded_at")?,
            })
        })
        .collect()
}

/// Which submissions a listing may return
#[derive(Debug, Clone)]
pub enum Visibility {
    /// Submissions whose student matches an administrative scope, plus the
    /// administrator's own advisees and review assignments
    Scoped {
        predicate: ScopePredicate,
        student_ids: Vec<Uuid>,
        reviewer_id: Uuid,
    },
    /// Submissions by these students or assigned to this reviewer
    Personal {
        student_ids: Vec<Uuid>,
        reviewer_id: Uuid,
    },
}

fn push_personal(qb: &mut QueryBuilder<'_, Sqlite>, student_ids: &[Uuid], reviewer_id: Uuid) {
    qb.push("s.id IN (SELECT submission_id FROM reviewer_assignments WHERE reviewer_id = ");
    qb.push_bind(reviewer_id.to_string());
    qb.push(")");
    if !student_ids.is_empty() {
        qb.push(" OR s.student_id IN (");
        let mut separated = qb.separated(", ");
        for id in student_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");
    }
}

/// Optional listing filters
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub kind: Option<SubmissionKind>,
    pub status: Option<SubmissionStatus>,
    pub student_id: Option<Uuid>,
}

pub async fn list_submissions(
    conn: &mut SqliteConnection,
    visibility: &Visibility,
    filter: &SubmissionFilter,
) -> Result<Vec<Submission>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT s.* FROM submissions s JOIN users u ON u.id = s.student_id WHERE ");

    qb.push("(");
    match visibility {
        Visibility::Scoped {
            predicate,
            student_ids,
            reviewer_id,
        } => {
            // Predicate placeholders are pushed one bind at a time
            qb.push("(");
            let mut parts = predicate.sql.split('?');
            if let Some(first) = parts.next() {
                qb.push(first);
            }
            for (part, value) in parts.zip(predicate.binds.iter()) {
                qb.push_bind(value.clone());
                qb.push(part);
            }
            qb.push(") OR ");
            push_personal(&mut qb, student_ids, *reviewer_id);
        }
        Visibility::Personal {
            student_ids,
            reviewer_id,
        } => push_personal(&mut qb, student_ids, *reviewer_id),
    }
    qb.push(")");

    if let Some(kind) = filter.kind {
        qb.push(" AND s.kind = ").push_bind(kind.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(student_id) = filter.student_id {
        qb.push(" AND s.student_id = ").push_bind(student_id.to_string());
    }
    qb.push(" ORDER BY s.updated_at DESC");

    let rows = qb.build().fetch_all(&mut *conn).await?;
    rows.iter().map(row_to_submission).collect()
}
