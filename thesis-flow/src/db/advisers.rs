//! Student ↔ adviser links

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::Result;

pub async fn get_adviser_id(conn: &mut SqliteConnection, student_id: Uuid) -> Result<Option<Uuid>> {
    let adviser: Option<String> =
        sqlx::query_scalar("SELECT adviser_id FROM adviser_links WHERE student_id = ?")
            .bind(student_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    adviser.as_deref().map(parse_uuid).transpose()
}

/// Insert a new link
///
/// Fails with a UNIQUE violation when the student already has an adviser.
pub async fn insert_link(
    conn: &mut SqliteConnection,
    student_id: Uuid,
    adviser_id: Uuid,
    assigned_by: Uuid,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO adviser_links (student_id, adviser_id, assigned_by, assigned_at) VALUES (?, ?, ?, ?)",
    )
    .bind(student_id.to_string())
    .bind(adviser_id.to_string())
    .bind(assigned_by.to_string())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Point an existing link at a different adviser
///
/// Guarded on the previous adviser; returns rows affected.
pub async fn replace_link(
    conn: &mut SqliteConnection,
    student_id: Uuid,
    previous_adviser: Uuid,
    adviser_id: Uuid,
    assigned_by: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE adviser_links
        SET adviser_id = ?, assigned_by = ?, assigned_at = ?
        WHERE student_id = ? AND adviser_id = ?
        "#,
    )
    .bind(adviser_id.to_string())
    .bind(assigned_by.to_string())
    .bind(Utc::now())
    .bind(student_id.to_string())
    .bind(previous_adviser.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Remove a student's link; returns rows affected
pub async fn delete_link(conn: &mut SqliteConnection, student_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM adviser_links WHERE student_id = ?")
        .bind(student_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn advisee_ids(conn: &mut SqliteConnection, adviser_id: Uuid) -> Result<Vec<Uuid>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT student_id FROM adviser_links WHERE adviser_id = ?")
            .bind(adviser_id.to_string())
            .fetch_all(&mut *conn)
            .await?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}
