use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, LoginRequest, NewRegistration, RegisterRequest, User, UserStatus};
use crate::utils::{hash_password, normalize_username, verify_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending approval", body = User),
        (status = 403, description = "Registration code rejected"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let username = normalize_username(&payload.username)?;
    let password_hash = hash_password(&payload.password)?;

    let user = state
        .services
        .users
        .register(NewRegistration {
            username,
            password_hash,
            requested_role: payload.requested_role,
            registration_code: payload.registration_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account pending approval or disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = state
        .services
        .users
        .find_credentials(payload.username.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    match user.status {
        UserStatus::Active => {}
        UserStatus::Pending => return Err(AppError::forbidden("account is awaiting approval")),
        UserStatus::Disabled => return Err(AppError::forbidden("account is disabled")),
    }

    let token = state.jwt.encode(user.id)?;
    tracing::info!(user_id = %user.id, "user logged in");
    log_activity(
        &state.events,
        "login",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let user = state.services.users.get_user(auth.user_id).await?;
    Ok(Json(user))
}
