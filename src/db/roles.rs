//! Role rows. Plain queries only: validation, cascades and cache handling
//! live in the registry service.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::models::role::{DataReach, DbRole};

const ROLE_COLUMNS: &str = "name, display_name, permissions, data_reach, is_built_in, created_at, updated_at";

pub async fn fetch_role<'e, E>(executor: E, name: &str) -> Result<Option<DbRole>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, DbRole>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?"))
        .bind(name)
        .fetch_optional(executor)
        .await
}

pub async fn list_roles<'e, E>(executor: E) -> Result<Vec<DbRole>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, DbRole>(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY seq"))
        .fetch_all(executor)
        .await
}

pub async fn insert_role(
    conn: &mut SqliteConnection,
    name: &str,
    display_name: &str,
    permissions_json: &str,
    data_reach: DataReach,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO roles (name, display_name, permissions, data_reach, is_built_in, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(name)
    .bind(display_name)
    .bind(permissions_json)
    .bind(data_reach.as_str())
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Replaces matrix and reach in one statement.
pub async fn update_matrix(
    conn: &mut SqliteConnection,
    name: &str,
    permissions_json: &str,
    data_reach: DataReach,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE roles SET permissions = ?, data_reach = ?, updated_at = ? WHERE name = ?")
        .bind(permissions_json)
        .bind(data_reach.as_str())
        .bind(now)
        .bind(name)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn rename_role(
    conn: &mut SqliteConnection,
    old_name: &str,
    new_name: &str,
    display_name: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE roles SET name = ?, display_name = ?, updated_at = ? WHERE name = ?")
        .bind(new_name)
        .bind(display_name)
        .bind(now)
        .bind(old_name)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_role(conn: &mut SqliteConnection, name: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM roles WHERE name = ? AND is_built_in = 0")
        .bind(name)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
