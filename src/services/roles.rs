//! Role registry and role mutations.
//!
//! Reads go through the [`RoleCache`]. Every mutation validates its input,
//! runs in one transaction behind the [`WriteGate`], invalidates the affected
//! cache entries after commit and before returning, then publishes an audit
//! event.

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::RoleCache;
use crate::db::{self, WriteGate};
use crate::errors::{RbacError, RbacResult};
use crate::events::{log_activity, EventBus, RequestContext};
use crate::models::role::{
    normalize_display_name, validate_role_name, DataReach, PermissionMatrix, Role,
};
use crate::utils::utc_now;

/// Input for [`RoleRegistry::create_role`].
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub permissions: PermissionMatrix,
    pub data_reach: DataReach,
}

/// Who asked for a mutation, for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct Audit {
    pub actor_id: Option<Uuid>,
    pub context: Option<RequestContext>,
}

impl Audit {
    pub fn by(actor_id: Uuid) -> Self {
        Self { actor_id: Some(actor_id), context: None }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Clone)]
pub struct RoleRegistry {
    pool: SqlitePool,
    gate: WriteGate,
    cache: Arc<RoleCache>,
    events: EventBus,
}

impl RoleRegistry {
    pub fn new(pool: SqlitePool, gate: WriteGate, events: EventBus) -> Self {
        Self {
            pool,
            gate,
            cache: Arc::new(RoleCache::new()),
            events,
        }
    }

    pub fn cache(&self) -> &RoleCache {
        &self.cache
    }

    pub async fn find_role(&self, name: &str) -> RbacResult<Option<Arc<Role>>> {
        if let Some(role) = self.cache.get(name) {
            return Ok(Some(role));
        }

        let epoch = self.cache.epoch();
        match db::roles::fetch_role(&self.pool, name).await? {
            Some(row) => {
                let role = Role::try_from(row)?;
                Ok(Some(self.cache.insert_if_current(role, epoch)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_role(&self, name: &str) -> RbacResult<Arc<Role>> {
        self.find_role(name)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(name.to_string()))
    }

    /// All roles in creation order, read straight from storage.
    pub async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        db::roles::list_roles(&self.pool)
            .await?
            .into_iter()
            .map(Role::try_from)
            .collect()
    }

    pub async fn create_role(&self, audit: Audit, new: NewRole) -> RbacResult<Role> {
        validate_role_name(&new.name)?;
        let display_name = normalize_display_name(&new.display_name)?;
        new.permissions.validate()?;
        let permissions_json = encode_matrix(&new.permissions)?;

        let _write = self.gate.acquire().await;
        let mut tx = self.pool.begin().await?;

        if db::roles::fetch_role(&mut *tx, &new.name).await?.is_some() {
            return Err(RbacError::DuplicateRole(new.name));
        }

        db::roles::insert_role(&mut tx, &new.name, &display_name, &permissions_json, new.data_reach, utc_now())
            .await
            .map_err(|err| duplicate_or(err, &new.name))?;

        let role = load_in_tx(&mut tx, &new.name).await?;
        tx.commit().await?;
        self.cache.invalidate(&role.name);

        tracing::info!(role = %role.name, reach = %role.data_reach, "role created");
        log_activity(&self.events, "created", audit.actor_id, &role, None, audit.context);

        Ok(role)
    }

    /// Renames a role and moves every user bound to it, atomically.
    pub async fn rename_role(
        &self,
        audit: Audit,
        old_name: &str,
        new_name: &str,
        new_display_name: Option<&str>,
    ) -> RbacResult<Role> {
        validate_role_name(new_name)?;
        let new_display_name = new_display_name.map(normalize_display_name).transpose()?;

        let _write = self.gate.acquire().await;
        let mut tx = self.pool.begin().await?;

        let old = load_in_tx(&mut tx, old_name).await?;
        if old.is_built_in {
            return Err(RbacError::ImmutableRole(old.name));
        }

        if new_name != old_name && db::roles::fetch_role(&mut *tx, new_name).await?.is_some() {
            return Err(RbacError::DuplicateRole(new_name.to_string()));
        }

        let display_name = new_display_name.unwrap_or_else(|| old.display_name.clone());
        let now = utc_now();

        db::roles::rename_role(&mut tx, old_name, new_name, &display_name, now)
            .await
            .map_err(|err| duplicate_or(err, new_name))?;

        let moved = if new_name != old_name {
            db::users::reassign_role(&mut tx, old_name, new_name, now).await?
        } else {
            0
        };

        let role = load_in_tx(&mut tx, new_name).await?;
        tx.commit().await?;
        self.cache.invalidate(old_name);
        self.cache.invalidate(new_name);

        tracing::info!(from = %old_name, to = %new_name, users = moved, "role renamed");
        log_activity(&self.events, "renamed", audit.actor_id, &role, Some(&old), audit.context);

        Ok(role)
    }

    /// Deletes a role nobody holds. Users are never removed along with it.
    pub async fn delete_role(&self, audit: Audit, name: &str) -> RbacResult<()> {
        let _write = self.gate.acquire().await;
        let mut tx = self.pool.begin().await?;

        let role = load_in_tx(&mut tx, name).await?;
        if role.is_built_in {
            return Err(RbacError::ImmutableRole(role.name));
        }

        let holders = db::users::count_role_holders(&mut *tx, name).await?;
        if holders > 0 {
            return Err(RbacError::RoleInUse { role: role.name, users: holders });
        }

        db::roles::delete_role(&mut tx, name).await?;
        tx.commit().await?;
        self.cache.invalidate(name);

        tracing::info!(role = %name, "role deleted");
        log_activity(&self.events, "deleted", audit.actor_id, &role, None, audit.context);

        Ok(())
    }

    /// Replaces a role's matrix and reach in a single row update.
    pub async fn update_permissions(
        &self,
        audit: Audit,
        name: &str,
        permissions: PermissionMatrix,
        data_reach: DataReach,
    ) -> RbacResult<Role> {
        let _write = self.gate.acquire().await;
        let mut tx = self.pool.begin().await?;

        let old = load_in_tx(&mut tx, name).await?;
        if old.is_built_in {
            return Err(RbacError::ImmutableRole(old.name));
        }

        permissions.validate()?;
        let permissions_json = encode_matrix(&permissions)?;

        db::roles::update_matrix(&mut tx, name, &permissions_json, data_reach, utc_now()).await?;

        let role = load_in_tx(&mut tx, name).await?;
        tx.commit().await?;
        self.cache.invalidate(name);

        tracing::info!(role = %name, reach = %data_reach, "role permissions updated");
        log_activity(&self.events, "permissions_updated", audit.actor_id, &role, Some(&old), audit.context);

        Ok(role)
    }
}

async fn load_in_tx(conn: &mut sqlx::SqliteConnection, name: &str) -> RbacResult<Role> {
    let row = db::roles::fetch_role(&mut *conn, name)
        .await?
        .ok_or_else(|| RbacError::RoleNotFound(name.to_string()))?;
    Role::try_from(row)
}

fn encode_matrix(permissions: &PermissionMatrix) -> RbacResult<String> {
    serde_json::to_string(permissions)
        .map_err(|err| RbacError::Integrity(format!("failed to encode permission matrix: {err}")))
}

fn duplicate_or(err: sqlx::Error, name: &str) -> RbacError {
    if db::is_unique_violation(&err) {
        RbacError::DuplicateRole(name.to_string())
    } else {
        RbacError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::init_event_bus;
    use crate::models::role::{Resource, ResourcePermission};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn registry() -> RoleRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        let (events, _rx) = init_event_bus();
        RoleRegistry::new(pool, WriteGate::new(), events)
    }

    fn new_role(name: &str) -> NewRole {
        NewRole {
            name: name.to_string(),
            display_name: "Operator".to_string(),
            permissions: PermissionMatrix::new()
                .with(Resource::Tasks, ResourcePermission::EDIT)
                .with(Resource::Reports, ResourcePermission::VIEW),
            data_reach: DataReach::Department,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let registry = registry().await;
        let created = registry.create_role(Audit::default(), new_role("operator")).await.unwrap();
        let fetched = registry.get_role("operator").await.unwrap();

        assert_eq!(*fetched, created);
        assert_eq!(fetched.display_name, "Operator");
        assert_eq!(fetched.data_reach, DataReach::Department);
        assert_eq!(fetched.permissions.get(Resource::Tasks), Some(&ResourcePermission::EDIT));
        assert!(!fetched.is_built_in);
    }

    #[tokio::test]
    async fn list_keeps_creation_order() {
        let registry = registry().await;
        for name in ["zeta", "alpha", "mid"] {
            registry.create_role(Audit::default(), new_role(name)).await.unwrap();
        }

        let names: Vec<String> = registry.list_roles().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["admin", "zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let registry = registry().await;
        registry.create_role(Audit::default(), new_role("operator")).await.unwrap();

        let dup = registry.create_role(Audit::default(), new_role("operator")).await;
        assert!(matches!(dup, Err(RbacError::DuplicateRole(_))));

        let admin = registry.create_role(Audit::default(), new_role("admin")).await;
        assert!(matches!(admin, Err(RbacError::DuplicateRole(_))));

        let bad_name = registry.create_role(Audit::default(), new_role("Line Lead")).await;
        assert!(matches!(bad_name, Err(RbacError::InvalidName(_))));

        let mut edit_only = new_role("editor");
        edit_only.permissions = PermissionMatrix::new()
            .with(Resource::Tasks, ResourcePermission { can_view: false, can_edit: true });
        let edit_only = registry.create_role(Audit::default(), edit_only).await;
        assert!(matches!(edit_only, Err(RbacError::InvalidPermissionCombination { .. })));
    }

    #[tokio::test]
    async fn admin_is_immutable() {
        let registry = registry().await;
        let admin = registry.get_role("admin").await.unwrap();
        assert!(admin.is_built_in);
        assert_eq!(admin.data_reach, DataReach::All);

        let rename = registry.rename_role(Audit::default(), "admin", "root", None).await;
        assert!(matches!(rename, Err(RbacError::ImmutableRole(_))));

        let delete = registry.delete_role(Audit::default(), "admin").await;
        assert!(matches!(delete, Err(RbacError::ImmutableRole(_))));

        let update = registry
            .update_permissions(Audit::default(), "admin", PermissionMatrix::new(), DataReach::Own)
            .await;
        assert!(matches!(update, Err(RbacError::ImmutableRole(_))));
    }

    #[tokio::test]
    async fn update_invalidates_cached_role() {
        let registry = registry().await;
        registry.create_role(Audit::default(), new_role("operator")).await.unwrap();
        let before = registry.get_role("operator").await.unwrap();
        assert!(before.permissions.get(Resource::Tasks).unwrap().can_edit);
        assert!(registry.cache().get("operator").is_some());

        registry
            .update_permissions(
                Audit::default(),
                "operator",
                PermissionMatrix::new().with(Resource::Tasks, ResourcePermission::VIEW),
                DataReach::Own,
            )
            .await
            .unwrap();

        assert!(registry.cache().get("operator").is_none());
        let after = registry.get_role("operator").await.unwrap();
        assert!(!after.permissions.get(Resource::Tasks).unwrap().can_edit);
        assert_eq!(after.data_reach, DataReach::Own);
    }

    #[tokio::test]
    async fn rejected_update_leaves_role_untouched() {
        let registry = registry().await;
        let original = registry.create_role(Audit::default(), new_role("operator")).await.unwrap();

        let result = registry
            .update_permissions(
                Audit::default(),
                "operator",
                PermissionMatrix::new().with(Resource::Reports, ResourcePermission { can_view: false, can_edit: true }),
                DataReach::All,
            )
            .await;
        assert!(matches!(result, Err(RbacError::InvalidPermissionCombination { .. })));

        assert_eq!(*registry.get_role("operator").await.unwrap(), original);
    }

    #[tokio::test]
    async fn rename_to_taken_name_fails() {
        let registry = registry().await;
        registry.create_role(Audit::default(), new_role("operator")).await.unwrap();
        registry.create_role(Audit::default(), new_role("inspector")).await.unwrap();

        let result = registry.rename_role(Audit::default(), "operator", "inspector", None).await;
        assert!(matches!(result, Err(RbacError::DuplicateRole(_))));

        let missing = registry.rename_role(Audit::default(), "ghost", "spirit", None).await;
        assert!(matches!(missing, Err(RbacError::RoleNotFound(_))));
    }

    #[tokio::test]
    async fn rename_to_same_name_updates_display_name() {
        let registry = registry().await;
        registry.create_role(Audit::default(), new_role("operator")).await.unwrap();

        let role = registry
            .rename_role(Audit::default(), "operator", "operator", Some("Machine Operator"))
            .await
            .unwrap();
        assert_eq!(role.name, "operator");
        assert_eq!(role.display_name, "Machine Operator");
    }

    #[tokio::test]
    async fn delete_unused_role() {
        let registry = registry().await;
        registry.create_role(Audit::default(), new_role("temp")).await.unwrap();
        registry.get_role("temp").await.unwrap();

        registry.delete_role(Audit::default(), "temp").await.unwrap();

        assert!(registry.find_role("temp").await.unwrap().is_none());
        assert!(registry.list_roles().await.unwrap().iter().all(|r| r.name != "temp"));
        let again = registry.delete_role(Audit::default(), "temp").await;
        assert!(matches!(again, Err(RbacError::RoleNotFound(_))));
    }
}
