//! Review queries

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, uuid_col};
use crate::error::Result;
use crate::models::Review;

fn row_to_review(row: &SqliteRow) -> Result<Review> {
    Ok(Review {
        id: uuid_col(row, "id")?,
        assignment_id: uuid_col(row, "assignment_id")?,
        submission_id: uuid_col(row, "submission_id")?,
        reviewer_id: uuid_col(row, "reviewer_id")?,
        submission_version: row.try_get("submission_version")?,
        verdict: code_col(row, "verdict")?,
        rank_order: row.try_get("rank_order")?,
        score: row.try_get("score")?,
        comments: row.try_get("comments")?,
        signature_path: row.try_get("signature_path")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert or replace the single review belonging to an assignment
///
/// A replaced review keeps its id and creation time.
pub async fn upsert_review(conn: &mut SqliteConnection, r: &Review) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reviews
            (id, assignment_id, submission_id, reviewer_id, submission_version, verdict,
             rank_order, score, comments, signature_path, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(assignment_id) DO UPDATE SET
            submission_version = excluded.submission_version,
            verdict = excluded.verdict,
            rank_order = excluded.rank_order,
            score = excluded.score,
            comments = excluded.comments,
            signature_path = excluded.signature_path,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(r.id.to_string())
    .bind(r.assignment_id.to_string())
    .bind(r.submission_id.to_string())
    .bind(r.reviewer_id.to_string())
    .bind(r.submission_version)
    .bind(r.verdict.as_str())
    .bind(r.rank_order)
    .bind(r.score)
    .bind(&r.comments)
    .bind(&r.signature_path)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_for_assignment(
    conn: &mut SqliteConnection,
    assignment_id: Uuid,
) -> Result<Option<Review>> {
    let row = sqlx::query("SELECT * FROM reviews WHERE assignment_id = ?")
        .bind(assignment_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_review).transpose()
}

pub async fn list_for_submission(
    conn: &mut SqliteConnection,
    submission_id: Uuid,
) -> Result<Vec<Review>> {
    let rows = sqlx::query("SELECT * FROM reviews WHERE submission_id = ? ORDER BY updated_at")
        .bind(submission_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_review).collect()
}

/// Remove the signature from a review; returns rows affected
pub async fn clear_signature(conn: &mut SqliteConnection, assignment_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE reviews SET signature_path = NULL, updated_at = ?
        WHERE assignment_id = ? AND signature_path IS NOT NULL
        "#,
    )
    .bind(Utc::now())
    .bind(assignment_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
