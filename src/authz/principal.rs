use uuid::Uuid;

use crate::models::role::ADMIN_ROLE;
use crate::models::user::{User, UserStatus};

/// The authenticated user as seen by authorization: a fresh snapshot of the
/// identity fields, re-read from storage for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role_name: Option<String>,
    pub status: UserStatus,
    pub department_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            role_name: None,
            status: UserStatus::Pending,
            department_id: None,
            group_id: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role_name = Some(role.into());
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_department(mut self, department_id: Uuid) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn with_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Active and bound to the built-in admin role.
    pub fn is_admin(&self) -> bool {
        self.is_active() && self.role_name.as_deref() == Some(ADMIN_ROLE)
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role_name: user.role_name.clone(),
            status: user.status,
            department_id: user.department_id,
            group_id: user.group_id,
        }
    }
}

/// Ownership coordinates of a single record, for data reach checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordScope {
    pub owner_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

impl RecordScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn in_department(mut self, department_id: Uuid) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn in_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// Records that can report their ownership coordinates.
pub trait Scoped {
    fn record_scope(&self) -> RecordScope;
}

impl Scoped for User {
    fn record_scope(&self) -> RecordScope {
        RecordScope {
            owner_id: Some(self.id),
            department_id: self.department_id,
            group_id: self.group_id,
        }
    }
}

impl Scoped for RecordScope {
    fn record_scope(&self) -> RecordScope {
        *self
    }
}
