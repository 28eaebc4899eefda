use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::role::Role;

/// In-memory copy of role definitions keyed by role name.
///
/// Mutations call [`RoleCache::invalidate`] after their transaction commits
/// and before they return. Every invalidation bumps an epoch; a reader that
/// loaded a row under an older epoch cannot store it, so a role read before
/// a revocation never lands in the cache after it.
#[derive(Debug, Default)]
pub struct RoleCache {
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    epoch: u64,
    entries: HashMap<String, Arc<Role>>,
}

impl RoleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Role>> {
        self.state.read().entries.get(name).cloned()
    }

    /// Epoch to capture before reading a role from storage.
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Stores `role` only if no invalidation happened since `epoch`.
    pub fn insert_if_current(&self, role: Role, epoch: u64) -> Arc<Role> {
        let role = Arc::new(role);
        let mut state = self.state.write();
        if state.epoch == epoch {
            state.entries.insert(role.name.clone(), Arc::clone(&role));
        } else {
            tracing::trace!(role = %role.name, "skipping stale role cache fill");
        }
        role
    }

    pub fn invalidate(&self, name: &str) {
        let mut state = self.state.write();
        state.epoch += 1;
        state.entries.remove(name);
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::{DataReach, PermissionMatrix};
    use chrono::Utc;

    fn role(name: &str) -> Role {
        Role {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            permissions: PermissionMatrix::new(),
            data_reach: DataReach::Own,
            is_built_in: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fill_and_invalidate() {
        let cache = RoleCache::new();
        let epoch = cache.epoch();
        cache.insert_if_current(role("operator"), epoch);
        assert!(cache.get("operator").is_some());

        cache.invalidate("operator");
        assert!(cache.get("operator").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_fill_is_discarded() {
        let cache = RoleCache::new();
        let epoch = cache.epoch();

        // a mutation lands between the storage read and the cache fill
        cache.invalidate("operator");
        let returned = cache.insert_if_current(role("operator"), epoch);

        assert_eq!(returned.name, "operator");
        assert!(cache.get("operator").is_none());
    }
}
