use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{PolicyEvaluator, Resource};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::user::{ApproveRequest, StatusRequest, User};

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "Users within the caller's data reach", body = [User]),
        (status = 403, description = "Caller may not view users"),
        (status = 500, description = "Caller's role binding is broken")
    )
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    let scope = state
        .services
        .policy
        .view_scope(&auth.principal, Resource::Users)
        .await
        .map_err(|denial| AppError::from_denial(denial, "not allowed to view users"))?;

    let users = state.services.users.list_visible(&scope).await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/pending",
    tag = "Users",
    responses(
        (status = 200, description = "Accounts awaiting approval", body = [User]),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn list_pending(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    auth.require_admin()?;
    let users = state.services.users.list_pending().await?;
    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/users/{id}/approve",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "User activated", body = User),
        (status = 404, description = "User or role not found"),
        (status = 409, description = "User already processed")
    )
)]
pub async fn approve_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveRequest>,
) -> AppResult<Json<User>> {
    auth.require_admin()?;

    let user = state
        .services
        .users
        .approve(
            auth.audit(&headers),
            id,
            payload.role.trim(),
            payload.department_id,
            payload.group_id,
        )
        .await?;

    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}/status",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status applied or already in place", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<User>> {
    auth.require_admin()?;

    if id == auth.user_id {
        return Err(AppError::conflict("administrators cannot change their own status"));
    }

    let user = state
        .services
        .users
        .set_status(auth.audit(&headers), id, payload.status)
        .await?;

    Ok(Json(user))
}
