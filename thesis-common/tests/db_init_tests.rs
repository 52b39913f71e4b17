//! Tests for database initialization and migrations
//!
//! Covers automatic database creation, re-opening an existing database,
//! schema completeness and the storage-level uniqueness guarantees the
//! workflow engine relies on.

use tempfile::TempDir;
use thesis_common::db::init::init_database;
use thesis_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};

const TABLES: &[&str] = &[
    "users",
    "user_roles",
    "adviser_links",
    "submissions",
    "submission_versions",
    "reviewer_assignments",
    "reviews",
    "defense_schedules",
    "defense_panel_members",
    "committee_requests",
    "calendar_entries",
    "route_slips",
    "notices_to_commence",
    "notifications",
];

async fn insert_user(pool: &sqlx::SqlitePool, id: &str, lastname: &str) {
    sqlx::query("INSERT INTO users (id, firstname, lastname) VALUES (?, 'Test', ?)")
        .bind(id)
        .bind(lastname)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("thesis.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("thesis.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("thesis.db")).await.unwrap();

    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_migrations_reach_current_version_and_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("thesis.db");

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);

    thesis_common::db::migrations::run_migrations(&pool).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_role_grant_is_idempotent_at_storage_layer() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("thesis.db")).await.unwrap();
    insert_user(&pool, "u1", "Reyes").await;

    for _ in 0..2 {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES ('u1', 'adviser')")
            .execute(&pool)
            .await
            .unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = 'u1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_unknown_role_rejected() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("thesis.db")).await.unwrap();
    insert_user(&pool, "u1", "Reyes").await;

    let result = sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ('u1', 'janitor')")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_single_adviser_link_per_student() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("thesis.db")).await.unwrap();
    insert_user(&pool, "s1", "Cruz").await;
    insert_user(&pool, "a1", "Santos").await;
    insert_user(&pool, "a2", "Lim").await;

    sqlx::query("INSERT INTO adviser_links (student_id, adviser_id, assigned_at) VALUES ('s1', 'a1', CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await
        .unwrap();

    let second = sqlx::query("INSERT INTO adviser_links (student_id, adviser_id, assigned_at) VALUES ('s1', 'a2', CURRENT_TIMESTAMP)")
        .execute(&pool)
        .await;
    assert!(second.is_err(), "second adviser link must violate the primary key");
}

#[tokio::test]
async fn test_live_notice_unique_per_submission() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("thesis.db")).await.unwrap();
    insert_user(&pool, "s1", "Cruz").await;
    sqlx::query(
        "INSERT INTO submissions (id, student_id, kind, title, file_path, status, submitted_at, updated_at)
         VALUES ('m1', 's1', 'outline_defense_manuscript', 'T', 'f', 'approved', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = |id: &'static str, status: &'static str| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                "INSERT INTO notices_to_commence (id, submission_id, student_id, status, fields, created_at)
                 VALUES (?, 'm1', 's1', ?, '{}', CURRENT_TIMESTAMP)",
            )
            .bind(id)
            .bind(status)
            .execute(&pool)
            .await
        }
    };

    assert!(insert("n1", "rejected").await.is_ok());
    assert!(insert("n2", "pending").await.is_ok());
    assert!(insert("n3", "approved").await.is_err(), "second live notice must be rejected");
}
