mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use factory_authz::router;

use common::{send, test_pool, test_state, TEST_PASSWORD};

#[tokio::test]
async fn auth_edge_cases() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let app = router(test_state(pool, None))?;

    // 1. Short password
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "short.pass", "password": "short" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Should fail with bad request for short password");

    // 2. Username too short after trimming
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "  ab  ", "password": TEST_PASSWORD })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 3. Valid registration, open because no code is configured
    let (status, user) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": " valid.user ", "password": TEST_PASSWORD })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "valid.user");
    assert_eq!(user["roleName"], serde_json::Value::Null);

    // 4. Same username again
    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "valid.user", "password": TEST_PASSWORD })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // 5. Wrong password
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "valid.user", "password": "wrongpassword" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for wrong password");

    // 6. Unknown user
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": TEST_PASSWORD })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for non-existent user");

    // 7. Correct password, still pending
    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "valid.user", "password": TEST_PASSWORD })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 8. Protected route without or with a garbage token
    let (status, _) = send(&app, "GET", "/users", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for missing token");

    let (status, _) = send(&app, "GET", "/authz/check?resource=Tasks&action=view", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}
