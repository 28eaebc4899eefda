pub mod roles;
pub mod users;

use sqlx::SqlitePool;

use crate::authz::RolePolicyEvaluator;
use crate::db::WriteGate;
use crate::events::EventBus;

pub use roles::{Audit, NewRole, RoleRegistry};
pub use users::UserService;

/// The authorization core wired over one pool, one write gate and one event
/// bus.
#[derive(Clone)]
pub struct Services {
    pub roles: RoleRegistry,
    pub users: UserService,
    pub policy: RolePolicyEvaluator,
    pub gate: WriteGate,
}

impl Services {
    pub fn new(pool: SqlitePool, events: EventBus, registration_code: Option<String>) -> Self {
        let gate = WriteGate::new();
        let roles = RoleRegistry::new(pool.clone(), gate.clone(), events.clone());
        let users = UserService::new(pool, gate.clone(), events.clone(), roles.clone(), registration_code);
        let policy = RolePolicyEvaluator::new(roles.clone(), events);

        Self { roles, users, policy, gate }
    }
}
