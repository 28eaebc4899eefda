use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::{RbacError, RbacResult};
use crate::events::{Loggable, Severity};

/// Name of the single built-in role. It bypasses the permission matrix.
pub const ADMIN_ROLE: &str = "admin";

const MAX_ROLE_NAME_LEN: usize = 64;

// =============================================================================
// RESOURCES AND ACTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Resource {
    Users,
    Departments,
    Groups,
    Products,
    Reports,
    Analytics,
    Tasks,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Users,
        Resource::Departments,
        Resource::Groups,
        Resource::Products,
        Resource::Reports,
        Resource::Analytics,
        Resource::Tasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "Users",
            Resource::Departments => "Departments",
            Resource::Groups => "Groups",
            Resource::Products => "Products",
            Resource::Reports => "Reports",
            Resource::Analytics => "Analytics",
            Resource::Tasks => "Tasks",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Edit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::View => f.write_str("view"),
            Action::Edit => f.write_str("edit"),
        }
    }
}

// =============================================================================
// DATA REACH
// =============================================================================

/// How far a role can see across rows. Ordered: own < department < group < all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataReach {
    Own,
    Department,
    Group,
    All,
}

impl DataReach {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataReach::Own => "own",
            DataReach::Department => "department",
            DataReach::Group => "group",
            DataReach::All => "all",
        }
    }
}

impl fmt::Display for DataReach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataReach {
    type Err = RbacError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "own" => Ok(DataReach::Own),
            "department" => Ok(DataReach::Department),
            "group" => Ok(DataReach::Group),
            "all" => Ok(DataReach::All),
            _ => Err(RbacError::InvalidReach(value.to_string())),
        }
    }
}

// =============================================================================
// PERMISSION MATRIX
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePermission {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
}

impl ResourcePermission {
    pub const NONE: ResourcePermission = ResourcePermission { can_view: false, can_edit: false };
    pub const VIEW: ResourcePermission = ResourcePermission { can_view: true, can_edit: false };
    pub const EDIT: ResourcePermission = ResourcePermission { can_view: true, can_edit: true };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Edit => self.can_edit,
        }
    }
}

/// Per-resource view/edit flags. Resources missing from the map are denied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct PermissionMatrix(BTreeMap<Resource, ResourcePermission>);

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: Resource, permission: ResourcePermission) -> Self {
        self.0.insert(resource, permission);
        self
    }

    pub fn get(&self, resource: Resource) -> Option<&ResourcePermission> {
        self.0.get(&resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Resource, &ResourcePermission)> {
        self.0.iter()
    }

    /// Rejects any entry that grants edit without view.
    pub fn validate(&self) -> RbacResult<()> {
        match self.0.iter().find(|(_, perm)| perm.can_edit && !perm.can_view) {
            Some((resource, _)) => Err(RbacError::InvalidPermissionCombination {
                resource: resource.to_string(),
            }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    pub display_name: String,
    pub permissions: PermissionMatrix,
    pub data_reach: DataReach,
    pub is_built_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_ROLE
    }
}

impl Loggable for Role {
    fn entity_type() -> &'static str { "role" }
    fn subject(&self) -> String { self.name.clone() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRole {
    pub name: String,
    pub display_name: String,
    pub permissions: String,
    pub data_reach: String,
    pub is_built_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbRole> for Role {
    type Error = RbacError;

    fn try_from(db: DbRole) -> Result<Self, Self::Error> {
        let permissions: PermissionMatrix = serde_json::from_str(&db.permissions).map_err(|err| {
            RbacError::Integrity(format!("role '{}' has an unreadable permission matrix: {err}", db.name))
        })?;

        Ok(Role {
            data_reach: db.data_reach.parse()?,
            name: db.name,
            display_name: db.display_name,
            permissions,
            is_built_in: db.is_built_in,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

/// Checks the slug rule for role names: lowercase ascii letters, digits, `_`.
pub fn validate_role_name(name: &str) -> RbacResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_ROLE_NAME_LEN
        && name.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'));

    if valid {
        Ok(())
    } else {
        Err(RbacError::InvalidName(name.to_string()))
    }
}

pub fn normalize_display_name(display_name: &str) -> RbacResult<String> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(RbacError::InvalidDisplayName);
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreateRequest {
    #[schema(example = "line_supervisor")]
    pub name: String,
    #[schema(example = "Line Supervisor")]
    pub display_name: String,
    #[serde(default)]
    pub permissions: PermissionMatrix,
    #[schema(example = "department")]
    pub data_reach: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionsRequest {
    pub permissions: PermissionMatrix,
    #[schema(example = "group")]
    pub data_reach: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleRenameRequest {
    #[schema(example = "shift_lead")]
    pub new_name: String,
    pub new_display_name: Option<String>,
}
