use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::role::{DataReach, Role, RoleCreateRequest, RolePermissionsRequest, RoleRenameRequest};
use crate::services::NewRole;

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "All roles in creation order", body = [Role]),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn list_roles(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Role>>> {
    auth.require_admin()?;
    let roles = state.services.roles.list_roles().await?;
    Ok(Json(roles))
}

#[utoipa::path(
    get,
    path = "/roles/{name}",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 200, description = "Role detail", body = Role),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> AppResult<Json<Role>> {
    auth.require_admin()?;
    let role = state.services.roles.get_role(&name).await?;
    Ok(Json(Role::clone(&role)))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "Roles",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Invalid name, display name, matrix or reach"),
        (status = 409, description = "Role name already exists")
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    auth.require_admin()?;
    let data_reach: DataReach = payload.data_reach.parse()?;

    let role = state
        .services
        .roles
        .create_role(
            auth.audit(&headers),
            NewRole {
                name: payload.name,
                display_name: payload.display_name,
                permissions: payload.permissions,
                data_reach,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    put,
    path = "/roles/{name}/permissions",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    request_body = RolePermissionsRequest,
    responses(
        (status = 200, description = "Permissions replaced", body = Role),
        (status = 400, description = "Invalid matrix or reach"),
        (status = 403, description = "Built-in role"),
        (status = 404, description = "Role not found")
    )
)]
pub async fn update_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(payload): Json<RolePermissionsRequest>,
) -> AppResult<Json<Role>> {
    auth.require_admin()?;
    let data_reach: DataReach = payload.data_reach.parse()?;

    let role = state
        .services
        .roles
        .update_permissions(auth.audit(&headers), &name, payload.permissions, data_reach)
        .await?;

    Ok(Json(role))
}

#[utoipa::path(
    post,
    path = "/roles/{name}/rename",
    tag = "Roles",
    params(("name" = String, Path, description = "Current role name")),
    request_body = RoleRenameRequest,
    responses(
        (status = 200, description = "Role renamed, holders moved", body = Role),
        (status = 403, description = "Built-in role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "New name already taken")
    )
)]
pub async fn rename_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(payload): Json<RoleRenameRequest>,
) -> AppResult<Json<Role>> {
    auth.require_admin()?;

    let role = state
        .services
        .roles
        .rename_role(
            auth.audit(&headers),
            &name,
            &payload.new_name,
            payload.new_display_name.as_deref(),
        )
        .await?;

    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/roles/{name}",
    tag = "Roles",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 403, description = "Built-in role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned to users")
    )
)]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    auth.require_admin()?;
    state.services.roles.delete_role(auth.audit(&headers), &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
