use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::Denial;
use crate::models::user::UserStatus;

pub type AppResult<T> = Result<T, AppError>;
pub type RbacResult<T> = Result<T, RbacError>;

/// Failures raised by the role registry and the user lifecycle.
///
/// These are input or integrity conflicts; callers surface them to the admin
/// UI instead of retrying.
#[derive(thiserror::Error, Debug)]
pub enum RbacError {
    #[error("role '{0}' not found")]
    RoleNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("role '{0}' already exists")]
    DuplicateRole(String),
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("role '{0}' is built in and cannot be changed")]
    ImmutableRole(String),
    #[error("role '{role}' is still assigned to {users} user(s)")]
    RoleInUse { role: String, users: i64 },
    #[error("{resource}: edit permission requires view permission")]
    InvalidPermissionCombination { resource: String },
    #[error("invalid role name '{0}': use lowercase letters, digits and underscores")]
    InvalidName(String),
    #[error("display name must not be empty")]
    InvalidDisplayName,
    #[error("invalid data reach '{0}': expected own, department, group or all")]
    InvalidReach(String),
    #[error("user {0} has already been processed")]
    AlreadyProcessed(Uuid),
    #[error("cannot move user from {from} to {to}")]
    InvalidTransition { from: UserStatus, to: UserStatus },
    #[error("registration code is not valid")]
    InvalidRegistrationCode,
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Maps a policy denial to a response. Broken role bindings and storage
    /// failures are server errors; everything else is a plain refusal.
    pub fn from_denial(denial: Denial, message: impl Into<String>) -> Self {
        match denial {
            Denial::Unbound => RbacError::Integrity("active account has no role binding".into()).into(),
            Denial::MissingRole(role) => RbacError::Integrity(format!("bound role '{role}' does not exist")).into(),
            Denial::Unavailable => Self::Internal("authorization is temporarily unavailable".into()),
            Denial::Inactive(_) | Denial::NotGranted => Self::Forbidden(message.into()),
        }
    }
}

impl From<RbacError> for AppError {
    fn from(err: RbacError) -> Self {
        let message = err.to_string();
        match err {
            RbacError::RoleNotFound(_) | RbacError::UserNotFound(_) => Self::NotFound(message),
            RbacError::DuplicateRole(_)
            | RbacError::DuplicateUsername(_)
            | RbacError::RoleInUse { .. }
            | RbacError::AlreadyProcessed(_)
            | RbacError::InvalidTransition { .. } => Self::Conflict(message),
            RbacError::ImmutableRole(_) | RbacError::InvalidRegistrationCode => Self::Forbidden(message),
            RbacError::InvalidPermissionCombination { .. }
            | RbacError::InvalidName(_)
            | RbacError::InvalidDisplayName
            | RbacError::InvalidReach(_) => Self::BadRequest(message),
            RbacError::Integrity(_) => Self::Internal(message),
            RbacError::Database(db) => Self::Database(db),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Database(ref err) = self {
            tracing::error!(error = %err, "database error");
        }

        let message = self.to_string();
        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rbac_errors_map_to_http_statuses() {
        let cases = [
            (RbacError::RoleNotFound("x".into()), StatusCode::NOT_FOUND),
            (RbacError::DuplicateRole("x".into()), StatusCode::CONFLICT),
            (RbacError::RoleInUse { role: "x".into(), users: 2 }, StatusCode::CONFLICT),
            (RbacError::ImmutableRole("admin".into()), StatusCode::FORBIDDEN),
            (
                RbacError::InvalidPermissionCombination { resource: "Tasks".into() },
                StatusCode::BAD_REQUEST,
            ),
            (RbacError::InvalidReach("world".into()), StatusCode::BAD_REQUEST),
            (RbacError::Integrity("dangling".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn denials_split_refusals_from_broken_bindings() {
        let cases = [
            (Denial::NotGranted, StatusCode::FORBIDDEN),
            (Denial::Inactive(UserStatus::Disabled), StatusCode::FORBIDDEN),
            (Denial::MissingRole("ghost".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Denial::Unbound, StatusCode::INTERNAL_SERVER_ERROR),
            (Denial::Unavailable, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (denial, expected) in cases {
            let response = AppError::from_denial(denial, "nope").into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
