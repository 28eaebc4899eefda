#![allow(dead_code)]

use std::path::Path;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use factory_authz::jwt::JwtConfig;
use factory_authz::models::user::{NewRegistration, User};
use factory_authz::services::{Audit, Services};
use factory_authz::{AppConfig, AppState};

pub const TEST_PASSWORD: &str = "password123";

/// Temp-dir SQLite file with migrations applied. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn test_pool() -> Result<(TempDir, SqlitePool)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

pub fn test_config(registration_code: Option<&str>) -> AppConfig {
    AppConfig {
        port: 8000,
        registration_code: registration_code.map(str::to_string),
        jwt: JwtConfig::new("test-secret", 1),
    }
}

pub fn test_state(pool: SqlitePool, registration_code: Option<&str>) -> AppState {
    AppState::new(pool, test_config(registration_code))
}

/// Registers `username` and approves it with the given binding.
pub async fn active_user(
    services: &Services,
    username: &str,
    role: &str,
    department_id: Option<Uuid>,
    group_id: Option<Uuid>,
) -> Result<User> {
    let user = pending_user(services, username).await?;
    let user = services
        .users
        .approve(Audit::default(), user.id, role, department_id, group_id)
        .await?;
    Ok(user)
}

pub async fn pending_user(services: &Services, username: &str) -> Result<User> {
    let user = services
        .users
        .register(NewRegistration {
            username: username.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            requested_role: None,
            registration_code: None,
        })
        .await?;
    Ok(user)
}

pub async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, json))
}
