//! Defense schedules, committee requests and calendar entries

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, opt_uuid_col, uuid_col};
use crate::error::Result;
use crate::models::{
    CalendarEntry, CommitteeRequest, DecisionStatus, DefenseSchedule, MemoFields, ScheduleStatus,
};
use crate::roles::Role;
use crate::scope::ScopePredicate;

fn row_to_schedule(row: &SqliteRow) -> Result<DefenseSchedule> {
    Ok(DefenseSchedule {
        id: uuid_col(row, "id")?,
        student_id: uuid_col(row, "student_id")?,
        submission_id: opt_uuid_col(row, "submission_id")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
        venue: row.try_get("venue")?,
        status: code_col(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_request(row: &SqliteRow) -> Result<CommitteeRequest> {
    let memo_number: Option<String> = row.try_get("memo_number")?;
    let memo = match memo_number {
        Some(number) => Some(MemoFields {
            number,
            series: row.try_get::<Option<String>, _>("memo_series")?.unwrap_or_default(),
            date: row.try_get::<Option<String>, _>("memo_date")?.unwrap_or_default(),
            subject: row.try_get::<Option<String>, _>("memo_subject")?.unwrap_or_default(),
            body: row.try_get("memo_body")?,
        }),
        None => None,
    };

    Ok(CommitteeRequest {
        id: uuid_col(row, "id")?,
        student_id: uuid_col(row, "student_id")?,
        submission_id: opt_uuid_col(row, "submission_id")?,
        schedule_id: uuid_col(row, "schedule_id")?,
        adviser_id: uuid_col(row, "adviser_id")?,
        chair_id: uuid_col(row, "chair_id")?,
        panel_ids: [uuid_col(row, "panel1_id")?, uuid_col(row, "panel2_id")?],
        requested_by: uuid_col(row, "requested_by")?,
        notes: row.try_get("notes")?,
        status: code_col(row, "status")?,
        memo,
        decided_by: opt_uuid_col(row, "decided_by")?,
        decided_at: row.try_get("decided_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_schedule(conn: &mut SqliteConnection, s: &DefenseSchedule) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO defense_schedules
            (id, student_id, submission_id, starts_at, ends_at, venue, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(s.id.to_string())
    .bind(s.student_id.to_string())
    .bind(s.submission_id.map(|id| id.to_string()))
    .bind(s.starts_at)
    .bind(s.ends_at)
    .bind(&s.venue)
    .bind(s.status.as_str())
    .bind(s.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_panel_member(
    conn: &mut SqliteConnection,
    schedule_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<()> {
    sqlx::query("INSERT INTO defense_panel_members (schedule_id, user_id, role) VALUES (?, ?, ?)")
        .bind(schedule_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn get_schedule(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<DefenseSchedule>> {
    let row = sqlx::query("SELECT * FROM defense_schedules WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_schedule).transpose()
}

/// Confirmed schedules at a venue, compared trimmed and case-insensitively
pub async fn confirmed_at_venue(
    conn: &mut SqliteConnection,
    venue: &str,
) -> Result<Vec<DefenseSchedule>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM defense_schedules
        WHERE status = 'confirmed' AND TRIM(venue) = TRIM(?) COLLATE NOCASE
        ORDER BY starts_at
        "#,
    )
    .bind(venue)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_schedule).collect()
}

/// Compare-and-set a schedule's status; returns rows affected
pub async fn set_schedule_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    expected: ScheduleStatus,
    new_status: ScheduleStatus,
) -> Result<u64> {
    let result = sqlx::query("UPDATE defense_schedules SET status = ? WHERE id = ? AND status = ?")
        .bind(new_status.as_str())
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert_request(conn: &mut SqliteConnection, r: &CommitteeRequest) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO committee_requests
            (id, student_id, submission_id, schedule_id, adviser_id, chair_id, panel1_id, panel2_id,
             requested_by, notes, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(r.id.to_string())
    .bind(r.student_id.to_string())
    .bind(r.submission_id.map(|id| id.to_string()))
    .bind(r.schedule_id.to_string())
    .bind(r.adviser_id.to_string())
    .bind(r.chair_id.to_string())
    .bind(r.panel_ids[0].to_string())
    .bind(r.panel_ids[1].to_string())
    .bind(r.requested_by.to_string())
    .bind(&r.notes)
    .bind(r.status.as_str())
    .bind(r.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_request(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<CommitteeRequest>> {
    let row = sqlx::query("SELECT * FROM committee_requests WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_request).transpose()
}

/// Move a pending request to its decision; returns rows affected
///
/// Guarded on `status = 'pending'` so only one decision can ever land.
pub async fn decide_request(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: DecisionStatus,
    memo: Option<&MemoFields>,
    decided_by: Uuid,
    decided_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE committee_requests
        SET status = ?, memo_number = ?, memo_series = ?, memo_date = ?, memo_subject = ?,
            memo_body = ?, decided_by = ?, decided_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(memo.map(|m| m.number.clone()))
    .bind(memo.map(|m| m.series.clone()))
    .bind(memo.map(|m| m.date.clone()))
    .bind(memo.map(|m| m.subject.clone()))
    .bind(memo.and_then(|m| m.body.clone()))
    .bind(decided_by.to_string())
    .bind(decided_at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Most recently approved committee for a student
pub async fn latest_approved_for_student(
    conn: &mut SqliteConnection,
    student_id: Uuid,
) -> Result<Option<CommitteeRequest>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM committee_requests
        WHERE student_id = ? AND status = 'approved'
        ORDER BY decided_at DESC
        LIMIT 1
        "#,
    )
    .bind(student_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_request).transpose()
}

/// Requests whose student lies inside `scope`, newest first
pub async fn list_requests(
    conn: &mut SqliteConnection,
    scope: &ScopePredicate,
    status: Option<DecisionStatus>,
) -> Result<Vec<CommitteeRequest>> {
    let sql = format!(
        r#"
        SELECT c.* FROM committee_requests c
        JOIN users u ON u.id = c.student_id
        WHERE {} AND (? IS NULL OR c.status = ?)
        ORDER BY c.created_at DESC
        "#,
        scope.sql
    );

    let status = status.map(|s| s.as_str());
    let mut query = sqlx::query(&sql);
    for value in &scope.binds {
        query = query.bind(value);
    }
    let rows = query.bind(status).bind(status).fetch_all(&mut *conn).await?;

    rows.iter().map(row_to_request).collect()
}

pub async fn insert_calendar_entry(conn: &mut SqliteConnection, e: &CalendarEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO calendar_entries
            (id, user_id, title, starts_at, ends_at, venue, committee_request_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(e.id.to_string())
    .bind(e.user_id.to_string())
    .bind(&e.title)
    .bind(e.starts_at)
    .bind(e.ends_at)
    .bind(&e.venue)
    .bind(e.committee_request_id.map(|id| id.to_string()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn calendar_for_user(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<Vec<CalendarEntry>> {
    let rows = sqlx::query("SELECT * FROM calendar_entries WHERE user_id = ? ORDER BY starts_at")
        .bind(user_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(CalendarEntry {
                id: uuid_col(row, "id")?,
                user_id: uuid_col(row, "user_id")?,
                title: row.try_get("title")?,
                starts_at: row.try_get("starts_at")?,
                ends_at: row.try_get("ends_at")?,
                venue: row.try_get("venue")?,
                committee_request_id: opt_uuid_col(row, "committee_request_id")?,
            })
        })
        .collect()
}
