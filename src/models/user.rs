use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::RbacError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = RbacError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(UserStatus::Pending),
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            other => Err(RbacError::Integrity(format!("unknown user status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Role asked for at registration. Advisory only.
    pub requested_role: Option<String>,
    /// Authoritative role binding, set by approval.
    pub role_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub status: UserStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject(&self) -> String { self.id.to_string() }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub requested_role: Option<String>,
    pub role_name: Option<String>,
    pub department_id: Option<String>,
    pub group_id: Option<String>,
    pub status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid, RbacError> {
    Uuid::parse_str(value).map_err(|err| RbacError::Integrity(format!("invalid uuid in users.{column}: {err}")))
}

impl TryFrom<DbUser> for User {
    type Error = RbacError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid("id", &value.id)?,
            username: value.username,
            requested_role: value.requested_role,
            role_name: value.role_name,
            department_id: value.department_id.as_deref().map(|v| parse_uuid("department_id", v)).transpose()?,
            group_id: value.group_id.as_deref().map(|v| parse_uuid("group_id", v)).transpose()?,
            status: value.status.parse()?,
            approved_at: value.approved_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Input to the registration step, after the password has been hashed.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub username: String,
    pub password_hash: String,
    pub requested_role: Option<String>,
    pub registration_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "m.okafor")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    #[schema(example = "operator")]
    pub requested_role: Option<String>,
    #[schema(example = "PLANT-7")]
    pub registration_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "m.okafor")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[schema(example = "operator")]
    pub role: String,
    pub department_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: UserStatus,
}
