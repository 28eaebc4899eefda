use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{Action, AuthorizationDecision, PolicyEvaluator, Resource};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckQuery {
    /// Resource type, e.g. `Products`.
    #[param(value_type = String, example = "Products")]
    pub resource: Resource,
    /// `view` or `edit`.
    #[param(value_type = String, example = "view")]
    pub action: Action,
}

/// Lets clients ask whether the caller may perform an action before showing
/// it. Denials are answers here, not errors; `integrityError` marks a denial
/// caused by a broken role binding.
#[utoipa::path(
    get,
    path = "/authz/check",
    tag = "Authorization",
    params(CheckQuery),
    responses(
        (status = 200, description = "Decision for the caller", body = AuthorizationDecision),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn check(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<AuthorizationDecision>> {
    let decision = state
        .services
        .policy
        .decide(&auth.principal, query.resource, query.action)
        .await;

    Ok(Json(decision))
}
