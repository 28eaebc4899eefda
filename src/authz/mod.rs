//! Authorization core.
//!
//! Two independent axes decide every request:
//! - action level: may this principal view or edit this kind of resource
//!   ([`evaluate`], [`PolicyEvaluator`]);
//! - data reach: which rows of that resource they may see ([`ReachScope`]).
//!
//! Handlers check the action first and only then narrow listings or single
//! records by reach. Every check fails closed.

mod cache;
mod evaluator;
mod principal;
mod reach;

pub use cache::RoleCache;
pub use evaluator::{evaluate, AuthorizationDecision, Denial, Evaluation, PolicyEvaluator, RolePolicyEvaluator};
pub use principal::{Principal, RecordScope, Scoped};
pub use reach::{ReachScope, ScopeColumns};

pub use crate::models::role::{Action, DataReach, Resource, ADMIN_ROLE};
