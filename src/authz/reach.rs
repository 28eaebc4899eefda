use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::principal::{Principal, RecordScope, Scoped};
use crate::models::role::{DataReach, Role};

/// Column names used to express a reach predicate over a listing query.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns {
    pub owner: &'static str,
    pub department: &'static str,
    pub group: &'static str,
}

impl ScopeColumns {
    pub const fn new(owner: &'static str, department: &'static str, group: &'static str) -> Self {
        Self { owner, department, group }
    }
}

/// Rows a requester may see for one resource, derived from their role's data
/// reach. Each level includes everything the previous one does: own records,
/// then the requester's department, then their group.
///
/// A requester missing the department or group their level is keyed on is
/// held to their own rows: `department` reach without a department, or
/// `group` reach without a group, behaves as `own`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachScope {
    user_id: Uuid,
    department_id: Option<Uuid>,
    group_id: Option<Uuid>,
    reach: DataReach,
}

impl ReachScope {
    pub fn new(principal: &Principal, reach: DataReach) -> Self {
        let reach = if principal.is_admin() { DataReach::All } else { reach };
        Self {
            user_id: principal.user_id,
            department_id: principal.department_id,
            group_id: principal.group_id,
            reach,
        }
    }

    /// Scope granted by `role`. The admin role always reaches everything.
    pub fn for_role(principal: &Principal, role: &Role) -> Self {
        let reach = if role.is_admin() { DataReach::All } else { role.data_reach };
        Self::new(principal, reach)
    }

    pub fn configured_reach(&self) -> DataReach {
        self.reach
    }

    /// Reach after accounting for a missing department or group.
    pub fn effective_reach(&self) -> DataReach {
        match self.reach {
            DataReach::All => DataReach::All,
            DataReach::Group if self.group_id.is_some() => DataReach::Group,
            DataReach::Department if self.department_id.is_some() => DataReach::Department,
            _ => DataReach::Own,
        }
    }

    /// Single-record check, e.g. before marking one report as solved.
    pub fn check(&self, record: &RecordScope) -> bool {
        let reach = self.effective_reach();
        if reach == DataReach::All {
            return true;
        }

        let own = record.owner_id == Some(self.user_id);
        let same_department = reach >= DataReach::Department && same(self.department_id, record.department_id);
        let same_group = reach >= DataReach::Group && same(self.group_id, record.group_id);

        own || same_department || same_group
    }

    /// Post-filter for listings that were loaded without a scoped query.
    pub fn filter<T: Scoped>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.check(&item.record_scope()))
            .collect()
    }

    /// Wraps `base_sql` in a subquery and appends the reach predicate with
    /// bound parameters. Callers may push an `ORDER BY` or `LIMIT` afterwards.
    pub fn scope_query<'q>(&self, base_sql: &str, columns: ScopeColumns) -> QueryBuilder<'q, Sqlite> {
        let mut query = QueryBuilder::new("SELECT * FROM (");
        query.push(base_sql);
        query.push(") AS scoped WHERE ");

        let reach = self.effective_reach();
        if reach == DataReach::All {
            query.push("1 = 1");
            return query;
        }

        query.push("(");
        query.push(columns.owner).push(" = ").push_bind(self.user_id.to_string());

        if reach >= DataReach::Department {
            if let Some(department_id) = self.department_id {
                query
                    .push(" OR ")
                    .push(columns.department)
                    .push(" = ")
                    .push_bind(department_id.to_string());
            }
        }

        if reach >= DataReach::Group {
            if let Some(group_id) = self.group_id {
                query.push(" OR ").push(columns.group).push(" = ").push_bind(group_id.to_string());
            }
        }

        query.push(")");
        query
    }
}

fn same(mine: Option<Uuid>, theirs: Option<Uuid>) -> bool {
    matches!((mine, theirs), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserStatus;

    fn operator(reach: DataReach, department: Option<Uuid>, group: Option<Uuid>) -> (Principal, ReachScope) {
        let mut principal = Principal::new(Uuid::new_v4())
            .with_role("operator")
            .with_status(UserStatus::Active);
        principal.department_id = department;
        principal.group_id = group;
        let scope = ReachScope::new(&principal, reach);
        (principal, scope)
    }

    #[test]
    fn own_reach_sees_only_own_records() {
        let dept = Uuid::new_v4();
        let (me, scope) = operator(DataReach::Own, Some(dept), None);

        assert!(scope.check(&RecordScope::new().owned_by(me.user_id)));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_department(dept)));
    }

    #[test]
    fn department_reach_includes_department_and_own() {
        let dept = Uuid::new_v4();
        let (me, scope) = operator(DataReach::Department, Some(dept), None);

        assert!(scope.check(&RecordScope::new().owned_by(me.user_id)));
        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_department(dept)));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_department(Uuid::new_v4())));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4())));
    }

    #[test]
    fn department_reach_without_department_degrades_to_own() {
        let (me, scope) = operator(DataReach::Department, None, None);
        assert_eq!(scope.effective_reach(), DataReach::Own);

        assert!(scope.check(&RecordScope::new().owned_by(me.user_id)));
        // another user without a department must stay invisible
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4())));
    }

    #[test]
    fn group_reach_matches_group_and_department() {
        let dept = Uuid::new_v4();
        let group = Uuid::new_v4();
        let (_, scope) = operator(DataReach::Group, Some(dept), Some(group));
        assert_eq!(scope.effective_reach(), DataReach::Group);

        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_group(group)));
        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_department(dept)));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_group(Uuid::new_v4())));
    }

    #[test]
    fn group_reach_without_group_degrades_to_own() {
        let dept = Uuid::new_v4();
        let (me, scope) = operator(DataReach::Group, Some(dept), None);
        assert_eq!(scope.configured_reach(), DataReach::Group);
        assert_eq!(scope.effective_reach(), DataReach::Own);

        assert!(scope.check(&RecordScope::new().owned_by(me.user_id)));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_department(dept)));

        let query = scope.scope_query("SELECT id FROM users", ScopeColumns::new("id", "department_id", "group_id"));
        assert!(query.sql().ends_with("WHERE (id = ?)"));
    }

    #[test]
    fn group_reach_without_department_still_matches_group() {
        let group = Uuid::new_v4();
        let (_, scope) = operator(DataReach::Group, None, Some(group));
        assert_eq!(scope.effective_reach(), DataReach::Group);

        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4()).in_group(group)));
        assert!(!scope.check(&RecordScope::new().owned_by(Uuid::new_v4())));
    }

    #[test]
    fn all_reach_sees_everything() {
        let (_, scope) = operator(DataReach::All, None, None);
        assert!(scope.check(&RecordScope::new()));
        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4())));
    }

    #[test]
    fn admin_always_reaches_all() {
        let admin = Principal::new(Uuid::new_v4())
            .with_role("admin")
            .with_status(UserStatus::Active);
        let scope = ReachScope::new(&admin, DataReach::Own);
        assert_eq!(scope.configured_reach(), DataReach::All);
        assert!(scope.check(&RecordScope::new().owned_by(Uuid::new_v4())));
    }

    #[test]
    fn filter_keeps_visible_records() {
        let dept = Uuid::new_v4();
        let (me, scope) = operator(DataReach::Department, Some(dept), None);
        let records = vec![
            RecordScope::new().owned_by(me.user_id),
            RecordScope::new().owned_by(Uuid::new_v4()).in_department(dept),
            RecordScope::new().owned_by(Uuid::new_v4()),
        ];

        assert_eq!(scope.filter(records).len(), 2);
    }

    #[test]
    fn scope_query_appends_bound_predicate() {
        let dept = Uuid::new_v4();
        let (_, scope) = operator(DataReach::Department, Some(dept), None);
        let columns = ScopeColumns::new("id", "department_id", "group_id");

        let query = scope.scope_query("SELECT id, department_id, group_id FROM users", columns);
        assert_eq!(
            query.sql(),
            "SELECT * FROM (SELECT id, department_id, group_id FROM users) AS scoped WHERE (id = ? OR department_id = ?)"
        );

        let (_, everything) = operator(DataReach::All, None, None);
        let query = everything.scope_query("SELECT id FROM users", columns);
        assert!(query.sql().ends_with("WHERE 1 = 1"));
    }
}
