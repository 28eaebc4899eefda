//! User lifecycle: `pending -> active -> disabled`.
//!
//! Approval is the only writer of the authoritative role, department and
//! group binding. Status changes are guarded by the transition table in
//! [`check_transition`].

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use super::roles::{Audit, RoleRegistry};
use crate::authz::{Principal, ReachScope};
use crate::db::{self, WriteGate};
use crate::errors::{RbacError, RbacResult};
use crate::events::{log_activity, EventBus};
use crate::models::user::{DbUser, NewRegistration, User, UserStatus};
use crate::utils::utc_now;

/// Outcome of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested status.
    Unchanged,
    Apply,
}

/// Allowed moves: `active <-> disabled` and `pending -> disabled`.
/// `pending -> active` goes through approval only, and a user that was never
/// approved cannot be enabled.
pub fn check_transition(from: UserStatus, to: UserStatus, has_binding: bool) -> RbacResult<Transition> {
    use UserStatus::*;

    match (from, to) {
        (a, b) if a == b => Ok(Transition::Unchanged),
        (Active, Disabled) | (Pending, Disabled) => Ok(Transition::Apply),
        (Disabled, Active) if has_binding => Ok(Transition::Apply),
        _ => Err(RbacError::InvalidTransition { from, to }),
    }
}

#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
    gate: WriteGate,
    events: EventBus,
    roles: RoleRegistry,
    registration_code: Option<Arc<str>>,
}

impl UserService {
    pub fn new(
        pool: SqlitePool,
        gate: WriteGate,
        events: EventBus,
        roles: RoleRegistry,
        registration_code: Option<String>,
    ) -> Self {
        Self {
            pool,
            gate,
            events,
            roles,
            registration_code: registration_code.map(Arc::from),
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> RbacResult<User> {
        db::users::fetch_user(&self.pool, user_id)
            .await?
            .ok_or(RbacError::UserNotFound(user_id))?
            .try_into()
    }

    /// Fresh identity snapshot for authorization, `None` for unknown ids.
    pub async fn principal(&self, user_id: Uuid) -> RbacResult<Option<Principal>> {
        match db::users::fetch_user(&self.pool, user_id).await? {
            Some(row) => {
                let user = User::try_from(row)?;
                Ok(Some(Principal::from(&user)))
            }
            None => Ok(None),
        }
    }

    /// Row with password hash, for credential checks.
    pub async fn find_credentials(&self, username: &str) -> RbacResult<Option<DbUser>> {
        Ok(db::users::fetch_by_username(&self.pool, username).await?)
    }

    pub async fn list_pending(&self) -> RbacResult<Vec<User>> {
        db::users::list_by_status(&self.pool, UserStatus::Pending)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Users visible under `scope`.
    pub async fn list_visible(&self, scope: &ReachScope) -> RbacResult<Vec<User>> {
        db::users::list_in_scope(&self.pool, scope)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Creates a pending account. The requested role is stored as advisory
    /// text and grants nothing.
    pub async fn register(&self, registration: NewRegistration) -> RbacResult<User> {
        if let Some(expected) = self.registration_code.as_deref() {
            if registration.registration_code.as_deref() != Some(expected) {
                tracing::warn!(username = %registration.username, "registration rejected: bad code");
                return Err(RbacError::InvalidRegistrationCode);
            }
        }

        let requested_role = registration
            .requested_role
            .as_deref()
            .map(str::trim)
            .filter(|role| !role.is_empty());
        let user_id = Uuid::new_v4();

        {
            let _write = self.gate.acquire().await;
            let mut conn = self.pool.acquire().await?;
            db::users::insert_pending(
                &mut conn,
                user_id,
                &registration.username,
                &registration.password_hash,
                requested_role,
                utc_now(),
            )
            .await
            .map_err(|err| {
                if db::is_unique_violation(&err) {
                    RbacError::DuplicateUsername(registration.username.clone())
                } else {
                    RbacError::Database(err)
                }
            })?;
        }

        let user = self.get_user(user_id).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered, awaiting approval");
        log_activity(&self.events, "registered", None, &user, None, None);

        Ok(user)
    }

    /// Activates a pending user with their final role, department and group.
    /// All four fields change in one statement.
    pub async fn approve(
        &self,
        audit: Audit,
        user_id: Uuid,
        role_name: &str,
        department_id: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> RbacResult<User> {
        let _write = self.gate.acquire().await;

        let before = self.get_user(user_id).await?;
        if before.status != UserStatus::Pending {
            return Err(RbacError::AlreadyProcessed(user_id));
        }

        if self.roles.find_role(role_name).await?.is_none() {
            return Err(RbacError::RoleNotFound(role_name.to_string()));
        }

        let mut conn = self.pool.acquire().await?;
        let updated =
            db::users::activate_pending(&mut conn, user_id, role_name, department_id, group_id, utc_now()).await?;
        drop(conn);
        if updated == 0 {
            return Err(RbacError::AlreadyProcessed(user_id));
        }

        let user = self.get_user(user_id).await?;
        tracing::info!(user_id = %user_id, role = %role_name, "user approved");
        log_activity(&self.events, "approved", audit.actor_id, &user, Some(&before), audit.context);

        Ok(user)
    }

    /// Moves a user to `status`. Setting the current status again is a no-op
    /// that returns the user unchanged.
    pub async fn set_status(&self, audit: Audit, user_id: Uuid, status: UserStatus) -> RbacResult<User> {
        let _write = self.gate.acquire().await;

        let before = self.get_user(user_id).await?;
        match check_transition(before.status, status, before.role_name.is_some())? {
            Transition::Unchanged => return Ok(before),
            Transition::Apply => {}
        }

        let mut conn = self.pool.acquire().await?;
        let updated = db::users::update_status(&mut conn, user_id, before.status, status, utc_now()).await?;
        drop(conn);
        if updated == 0 {
            return Err(RbacError::AlreadyProcessed(user_id));
        }

        let user = self.get_user(user_id).await?;
        tracing::info!(user_id = %user_id, from = %before.status, to = %status, "user status changed");
        log_activity(&self.events, "status_changed", audit.actor_id, &user, Some(&before), audit.context);

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UserStatus::*;

    #[test]
    fn transition_table() {
        assert_eq!(check_transition(Active, Disabled, true).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Pending, Disabled, false).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Disabled, Active, true).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Disabled, Disabled, true).unwrap(), Transition::Unchanged);
        assert_eq!(check_transition(Pending, Pending, false).unwrap(), Transition::Unchanged);

        for (from, to, bound) in [
            (Pending, Active, false),
            (Active, Pending, true),
            (Disabled, Pending, true),
            (Disabled, Active, false),
        ] {
            assert!(
                matches!(check_transition(from, to, bound), Err(RbacError::InvalidTransition { .. })),
                "{from} -> {to} should be rejected"
            );
        }
    }
}
