use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::principal::Principal;
use super::reach::ReachScope;
use crate::events::{log_integrity_alert, EventBus};
use crate::models::role::{Action, DataReach, Resource, Role, ADMIN_ROLE};
use crate::models::user::UserStatus;
use crate::services::roles::RoleRegistry;

/// Why an action-level check was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Pending or disabled accounts hold no permissions.
    Inactive(UserStatus),
    /// Active account without a role binding.
    Unbound,
    /// Active account bound to a role that does not exist.
    MissingRole(String),
    /// The role's matrix does not grant the action.
    NotGranted,
    /// The role could not be loaded from storage.
    Unavailable,
}

impl Denial {
    /// Dangling or missing bindings point at corrupted data, not a user mistake.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Denial::Unbound | Denial::MissingRole(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Allowed,
    Denied(Denial),
}

impl Evaluation {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Evaluation::Allowed)
    }
}

/// Action-level decision for one request.
///
/// Evaluation order:
/// 1. non-active account -> deny
/// 2. admin role -> allow without consulting any matrix
/// 3. missing binding or missing role -> deny (integrity error)
/// 4. resource absent from the matrix -> deny
/// 5. the matrix flag for the action
///
/// `role` is the role named by `principal.role_name`, or `None` if it could
/// not be found.
pub fn evaluate(principal: &Principal, role: Option<&Role>, resource: Resource, action: Action) -> Evaluation {
    if principal.status != UserStatus::Active {
        return Evaluation::Denied(Denial::Inactive(principal.status));
    }

    let role_name = match principal.role_name.as_deref() {
        Some(ADMIN_ROLE) => return Evaluation::Allowed,
        Some(name) => name,
        None => return Evaluation::Denied(Denial::Unbound),
    };

    let role = match role {
        Some(role) if role.name == role_name => role,
        _ => return Evaluation::Denied(Denial::MissingRole(role_name.to_string())),
    };

    match role.permissions.get(resource) {
        Some(permission) if permission.allows(action) => Evaluation::Allowed,
        _ => Evaluation::Denied(Denial::NotGranted),
    }
}

/// Ephemeral result handed to resource handlers. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub resource: Resource,
    pub action: Action,
    pub allowed: bool,
    /// Effective data reach when allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reach_level: Option<DataReach>,
    /// Set when the denial comes from a dangling or missing role binding
    /// rather than from the role's matrix.
    pub integrity_error: bool,
}

impl AuthorizationDecision {
    fn from_outcome(resource: Resource, action: Action, outcome: &Result<ReachScope, Denial>) -> Self {
        match outcome {
            Ok(scope) => Self {
                resource,
                action,
                allowed: true,
                reach_level: Some(scope.effective_reach()),
                integrity_error: false,
            },
            Err(denial) => Self {
                resource,
                action,
                allowed: false,
                reach_level: None,
                integrity_error: denial.is_integrity_error(),
            },
        }
    }
}

/// Policy evaluator trait for pluggable authorization logic
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn decide(&self, principal: &Principal, resource: Resource, action: Action) -> AuthorizationDecision;

    /// Row scope for listings, or the reason the principal may not view
    /// `resource` at all.
    async fn view_scope(&self, principal: &Principal, resource: Resource) -> Result<ReachScope, Denial>;

    async fn can(&self, principal: &Principal, resource: Resource, action: Action) -> bool {
        self.decide(principal, resource, action).await.allowed
    }
}

/// Evaluates principals against the role registry. Fails closed: storage
/// errors and dangling role references deny.
///
/// A dangling binding raises one critical audit event per user and role
/// name; repeats are only logged at debug level so a retrying client cannot
/// flood the event bus.
#[derive(Clone)]
pub struct RolePolicyEvaluator {
    roles: RoleRegistry,
    events: EventBus,
    alerted: Arc<Mutex<HashSet<(Uuid, Option<String>)>>>,
}

impl RolePolicyEvaluator {
    pub fn new(roles: RoleRegistry, events: EventBus) -> Self {
        Self {
            roles,
            events,
            alerted: Arc::default(),
        }
    }

    async fn resolve(&self, principal: &Principal, resource: Resource, action: Action) -> Result<ReachScope, Denial> {
        if !principal.is_active() {
            tracing::debug!(user_id = %principal.user_id, status = %principal.status, "inactive principal denied");
            return Err(Denial::Inactive(principal.status));
        }

        if principal.is_admin() {
            return Ok(ReachScope::new(principal, DataReach::All));
        }

        let role = match principal.role_name.as_deref() {
            Some(name) => match self.roles.find_role(name).await {
                Ok(role) => role,
                Err(err) => {
                    tracing::error!(user_id = %principal.user_id, role = %name, error = %err, "role lookup failed, denying");
                    return Err(Denial::Unavailable);
                }
            },
            None => None,
        };

        match (evaluate(principal, role.as_deref(), resource, action), role) {
            (Evaluation::Allowed, Some(role)) => Ok(ReachScope::for_role(principal, &role)),
            (Evaluation::Allowed, None) => Err(Denial::Unbound),
            (Evaluation::Denied(denial), _) if denial.is_integrity_error() => {
                self.raise_integrity_alert(principal, &denial);
                Err(denial)
            }
            (Evaluation::Denied(denial), _) => {
                tracing::debug!(
                    user_id = %principal.user_id,
                    %resource,
                    %action,
                    reason = ?denial,
                    "permission denied"
                );
                Err(denial)
            }
        }
    }

    fn raise_integrity_alert(&self, principal: &Principal, denial: &Denial) {
        let first = self
            .alerted
            .lock()
            .insert((principal.user_id, principal.role_name.clone()));

        if !first {
            tracing::debug!(user_id = %principal.user_id, reason = ?denial, "integrity error already reported");
            return;
        }

        let detail = format!("active user has unusable role binding: {denial:?}");
        tracing::error!(user_id = %principal.user_id, "{detail}");
        log_integrity_alert(&self.events, principal.user_id, &detail);
    }
}

#[async_trait]
impl PolicyEvaluator for RolePolicyEvaluator {
    async fn decide(&self, principal: &Principal, resource: Resource, action: Action) -> AuthorizationDecision {
        let outcome = self.resolve(principal, resource, action).await;
        AuthorizationDecision::from_outcome(resource, action, &outcome)
    }

    async fn view_scope(&self, principal: &Principal, resource: Resource) -> Result<ReachScope, Denial> {
        self.resolve(principal, resource, Action::View).await
    }
}
