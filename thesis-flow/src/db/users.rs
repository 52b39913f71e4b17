//! User and role queries

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{code_col, uuid_col};
use crate::error::{is_unique_violation, Result, WorkflowError};
use crate::models::{NewUser, UserRecord};
use crate::roles::{Role, RoleSet};
use crate::scope::{Affiliation, ScopePredicate};

const USER_COLUMNS: &str = "u.id, u.firstname, u.lastname, u.email, u.program, u.department, u.college";

fn row_to_user(row: &SqliteRow, roles: RoleSet) -> Result<UserRecord> {
    Ok(UserRecord {
        id: uuid_col(row, "id")?,
        firstname: row.try_get("firstname")?,
        lastname: row.try_get("lastname")?,
        email: row.try_get("email")?,
        affiliation: Affiliation::new(
            row.try_get("program")?,
            row.try_get("department")?,
            row.try_get("college")?,
        ),
        roles,
    })
}

pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let affiliation = Affiliation::new(
        user.program.clone(),
        user.department.clone(),
        user.college.clone(),
    );

    sqlx::query(
        r#"
        INSERT INTO users (id, firstname, lastname, email, program, department, college, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(user.firstname.trim())
    .bind(user.lastname.trim())
    .bind(&user.email)
    .bind(&affiliation.program)
    .bind(&affiliation.department)
    .bind(&affiliation.college)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            WorkflowError::Validation(format!(
                "email {} is already registered",
                user.email.as_deref().unwrap_or_default()
            ))
        } else {
            e.into()
        }
    })?;

    for role in &user.roles {
        grant_role(&mut *conn, id, *role).await?;
    }

    Ok(id)
}

/// Grant a role; returns true when the user did not already hold it
pub async fn grant_role(conn: &mut SqliteConnection, user_id: Uuid, role: Role) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO user_roles (user_id, role, granted_at) VALUES (?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_roles(conn: &mut SqliteConnection, user_id: Uuid) -> Result<RoleSet> {
    let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| code_col::<Role>(row, "role"))
        .collect()
}

pub async fn get_user(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let roles = get_roles(&mut *conn, user_id).await?;
            Ok(Some(row_to_user(&row, roles)?))
        }
        None => Ok(None),
    }
}

/// Holders of `role`, ordered by name
pub async fn users_with_role(conn: &mut SqliteConnection, role: Role) -> Result<Vec<UserRecord>> {
    let sql = format!(
        r#"
        SELECT {} FROM users u
        JOIN user_roles r ON r.user_id = u.id
        WHERE r.role = ?
        ORDER BY u.lastname, u.firstname
        "#,
        USER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(role.as_str())
        .fetch_all(&mut *conn)
        .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = uuid_col(row, "id")?;
        let roles = get_roles(&mut *conn, id).await?;
        users.push(row_to_user(row, roles)?);
    }
    Ok(users)
}

/// Students with no adviser link inside `scope`, ordered by last then first name
pub async fn list_unassigned_students(
    conn: &mut SqliteConnection,
    scope: &ScopePredicate,
    limit: i64,
    offset: i64,
) -> Result<Vec<UserRecord>> {
    let sql = format!(
        r#"
        SELECT {} FROM users u
        JOIN user_roles r ON r.user_id = u.id AND r.role = 'student'
        LEFT JOIN adviser_links l ON l.student_id = u.id
        WHERE l.student_id IS NULL AND {}
        ORDER BY u.lastname, u.firstname
        LIMIT ? OFFSET ?
        "#,
        USER_COLUMNS, scope.sql
    );

    let mut query = sqlx::query(&sql);
    for value in &scope.binds {
        query = query.bind(value);
    }
    let rows = query.bind(limit).bind(offset).fetch_all(&mut *conn).await?;

    let mut students = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = uuid_col(row, "id")?;
        let roles = get_roles(&mut *conn, id).await?;
        students.push(row_to_user(row, roles)?);
    }
    Ok(students)
}

pub async fn count_unassigned_students(
    conn: &mut SqliteConnection,
    scope: &ScopePredicate,
) -> Result<i64> {
    let sql = format!(
        r#"
        SELECT COUNT(*) FROM users u
        JOIN user_roles r ON r.user_id = u.id AND r.role = 'student'
        LEFT JOIN adviser_links l ON l.student_id = u.id
        WHERE l.student_id IS NULL AND {}
        "#,
        scope.sql
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for value in &scope.binds {
        query = query.bind(value);
    }
    Ok(query.fetch_one(&mut *conn).await?)
}
