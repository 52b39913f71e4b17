//! In-app notification rows

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::uuid_col;
use crate::error::Result;
use crate::models::Notification;

pub async fn insert_notification(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    title: &str,
    message: &str,
    link: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, title, message, link, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(title)
    .bind(message)
    .bind(link)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    unread_only: bool,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM notifications
        WHERE user_id = ? AND (? = 0 OR is_read = 0)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id.to_string())
    .bind(unread_only)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Notification {
                id: uuid_col(row, "id")?,
                user_id: uuid_col(row, "user_id")?,
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                link: row.try_get("link")?,
                is_read: row.try_get("is_read")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Mark one of the user's notifications read; returns rows affected
pub async fn mark_read(conn: &mut SqliteConnection, user_id: Uuid, id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
