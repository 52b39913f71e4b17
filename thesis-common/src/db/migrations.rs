//! Database schema migrations
//!
//! Versioned migrations applied after the baseline schema so that databases
//! created by older builds are upgraded in place.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - They must remain stable for databases upgrading from older versions
//! 2. **Always add new migrations** - Create a new migration function for each schema change
//! 3. **Idempotent** - Each migration checks before it alters, so re-running is safe
//! 4. **Use ALTER TABLE / CREATE INDEX** - Never DROP tables holding workflow history

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: at most one live Notice to Commence per submission
///
/// A partial unique index over pending/approved notices backs the
/// idempotent notice creation at the storage layer. Rejected notices do
/// not count, so a fresh notice can be issued after a rejection.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: unique live notice per submission");

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_notices_live_submission
        ON notices_to_commence(submission_id)
        WHERE status IN ('pending', 'approved')
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: lookup indexes for reviewer queues and venue conflicts
///
/// Databases created before `decline_reason` existed also gain the column.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: reviewer/venue indexes");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('reviewer_assignments') WHERE name = 'decline_reason'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        match sqlx::query("ALTER TABLE reviewer_assignments ADD COLUMN decline_reason TEXT")
            .execute(pool)
            .await
        {
            Ok(_) => info!("  ✓ Added decline_reason column to reviewer_assignments"),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                info!("  decline_reason column added concurrently - skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_assignments_reviewer ON reviewer_assignments(reviewer_id, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_schedules_venue ON defense_schedules(venue, status, starts_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
