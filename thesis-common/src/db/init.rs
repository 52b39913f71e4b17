//! Database initialization
//!
//! Creates the database on first run, applies the baseline schema
//! (`CREATE TABLE IF NOT EXISTS`, safe on every startup) and then runs the
//! versioned migrations.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers alongside the single writer transaction
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table of the baseline schema
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_tables(pool).await?;
    create_adviser_links_table(pool).await?;
    create_submissions_tables(pool).await?;
    create_review_tables(pool).await?;
    create_defense_tables(pool).await?;
    create_route_slip_tables(pool).await?;
    create_notifications_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            firstname TEXT NOT NULL,
            lastname TEXT NOT NULL,
            email TEXT UNIQUE,
            program TEXT,
            department TEXT,
            college TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Roles are additive; the primary key makes granting idempotent
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN (
                'student', 'adviser', 'faculty', 'panel',
                'committee_chairperson', 'program_chairperson', 'dean'
            )),
            granted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_adviser_links_table(pool: &SqlitePool) -> Result<()> {
    // student_id as primary key: at most one adviser per student
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS adviser_links (
            student_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            adviser_id TEXT NOT NULL REFERENCES users(id),
            assigned_by TEXT REFERENCES users(id),
            assigned_at TIMESTAMP NOT NULL,
            CHECK (student_id <> adviser_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submissions_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL CHECK (kind IN (
                'concept_paper', 'outline_defense_manuscript', 'route_slip', 'hardbound'
            )),
            title TEXT NOT NULL,
            file_path TEXT NOT NULL,
            status TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
            submitted_at TIMESTAMP NOT NULL,
            reviewed_at TIMESTAMP,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_versions (
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            version INTEGER NOT NULL,
            title TEXT NOT NULL,
            file_path TEXT NOT NULL,
            status TEXT NOT NULL,
            submitted_at TIMESTAMP NOT NULL,
            superseded_at TIMESTAMP NOT NULL,
            PRIMARY KEY (submission_id, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_submissions_student ON submissions(student_id, kind)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_review_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviewer_assignments (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            reviewer_id TEXT NOT NULL REFERENCES users(id),
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN (
                'pending', 'in_progress', 'completed', 'declined'
            )),
            due_at TIMESTAMP,
            instructions TEXT,
            decline_reason TEXT,
            assigned_by TEXT REFERENCES users(id),
            assigned_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (submission_id, reviewer_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL UNIQUE REFERENCES reviewer_assignments(id) ON DELETE CASCADE,
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            reviewer_id TEXT NOT NULL REFERENCES users(id),
            submission_version INTEGER NOT NULL DEFAULT 1,
            verdict TEXT NOT NULL,
            rank_order INTEGER CHECK (rank_order IS NULL OR rank_order > 0),
            score REAL,
            comments TEXT,
            signature_path TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_defense_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS defense_schedules (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES users(id),
            submission_id TEXT REFERENCES submissions(id),
            starts_at TIMESTAMP NOT NULL,
            ends_at TIMESTAMP NOT NULL,
            venue TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS defense_panel_members (
            schedule_id TEXT NOT NULL REFERENCES defense_schedules(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            role TEXT NOT NULL,
            PRIMARY KEY (schedule_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS committee_requests (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES users(id),
            submission_id TEXT REFERENCES submissions(id),
            schedule_id TEXT NOT NULL REFERENCES defense_schedules(id),
            adviser_id TEXT NOT NULL REFERENCES users(id),
            chair_id TEXT NOT NULL REFERENCES users(id),
            panel1_id TEXT NOT NULL REFERENCES users(id),
            panel2_id TEXT NOT NULL REFERENCES users(id),
            requested_by TEXT NOT NULL REFERENCES users(id),
            notes TEXT,
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            memo_number TEXT,
            memo_series TEXT,
            memo_date TEXT,
            memo_subject TEXT,
            memo_body TEXT,
            decided_by TEXT REFERENCES users(id),
            decided_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calendar_entries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            starts_at TIMESTAMP NOT NULL,
            ends_at TIMESTAMP NOT NULL,
            venue TEXT NOT NULL,
            committee_request_id TEXT REFERENCES committee_requests(id),
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_route_slip_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS route_slips (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL UNIQUE REFERENCES submissions(id) ON DELETE CASCADE,
            manuscript_id TEXT NOT NULL REFERENCES submissions(id),
            student_id TEXT NOT NULL REFERENCES users(id),
            adviser_id TEXT NOT NULL REFERENCES users(id),
            course TEXT NOT NULL,
            panel_member TEXT,
            action_taken TEXT NOT NULL,
            overall_decision TEXT,
            overall_notes TEXT,
            decided_by TEXT REFERENCES users(id),
            decided_at TIMESTAMP,
            adviser_signature_path TEXT,
            adviser_signed_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notices_to_commence (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id),
            student_id TEXT NOT NULL REFERENCES users(id),
            program_chair_id TEXT REFERENCES users(id),
            status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
            fields TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            forwarded_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            link TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)")
        .execute(pool)
        .await?;

    Ok(())
}
