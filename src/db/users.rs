use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::authz::{ReachScope, ScopeColumns};
use crate::models::user::{DbUser, UserStatus};

pub const USER_COLUMNS: &str = "id, username, password_hash, requested_role, role_name, department_id, group_id, \
                                status, approved_at, created_at, updated_at";

/// Where the ownership coordinates of a user row live.
pub const USER_SCOPE: ScopeColumns = ScopeColumns::new("id", "department_id", "group_id");

pub async fn fetch_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<DbUser>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(executor)
        .await
}

pub async fn fetch_by_username<'e, E>(executor: E, username: &str) -> Result<Option<DbUser>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
        .bind(username)
        .fetch_optional(executor)
        .await
}

pub async fn list_by_status(pool: &SqlitePool, status: UserStatus) -> Result<Vec<DbUser>, sqlx::Error> {
    sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE status = ? ORDER BY created_at"
    ))
    .bind(status.as_str())
    .fetch_all(pool)
    .await
}

/// Users inside `scope`, newest first.
pub async fn list_in_scope(pool: &SqlitePool, scope: &ReachScope) -> Result<Vec<DbUser>, sqlx::Error> {
    let base = format!("SELECT {USER_COLUMNS} FROM users");
    let mut query = scope.scope_query(&base, USER_SCOPE);
    query.push(" ORDER BY created_at DESC");

    query.build_query_as::<DbUser>().fetch_all(pool).await
}

pub async fn insert_pending(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    username: &str,
    password_hash: &str,
    requested_role: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, requested_role, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(username)
    .bind(password_hash)
    .bind(requested_role)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Binds role, department and group and activates, in one statement.
/// Matches only while the user is still pending.
pub async fn activate_pending(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    role_name: &str,
    department_id: Option<Uuid>,
    group_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET status = 'active', role_name = ?, department_id = ?, group_id = ?, \
         approved_at = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(role_name)
    .bind(department_id.map(|id| id.to_string()))
    .bind(group_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .bind(user_id.to_string())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn update_status(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    from: UserStatus,
    to: UserStatus,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now)
        .bind(user_id.to_string())
        .bind(from.as_str())
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Moves every authoritative binding and every advisory request from one role
/// name to another.
pub async fn reassign_role(
    conn: &mut SqliteConnection,
    old_name: &str,
    new_name: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let bound = sqlx::query("UPDATE users SET role_name = ?, updated_at = ? WHERE role_name = ?")
        .bind(new_name)
        .bind(now)
        .bind(old_name)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE users SET requested_role = ? WHERE requested_role = ? AND status = 'pending'")
        .bind(new_name)
        .bind(old_name)
        .execute(&mut *conn)
        .await?;

    Ok(bound.rows_affected())
}

pub async fn count_role_holders<'e, E>(executor: E, role_name: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE role_name = ?")
        .bind(role_name)
        .fetch_one(executor)
        .await
}
