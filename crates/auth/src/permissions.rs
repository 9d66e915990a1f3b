use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier in `resource:action` form (e.g. `"offers:approve"`).
///
/// The special wildcard permission `"*"` grants everything; only
/// [`Role::SUPER_ADMIN`] holds it in the standard set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a permission from its resource and action parts.
    pub fn of(resource: &str, action: &str) -> Self {
        Self(Cow::Owned(format!("{resource}:{action}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> Option<&str> {
        self.0.split_once(':').map(|(resource, _)| resource)
    }

    pub fn action(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, action)| action)
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission mapping.
///
/// Built once and read-only afterwards; [`PermissionSet::standard`] is the
/// process-wide instance the resolver functions consult.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: HashMap<Role, HashSet<Permission>>,
}

static STANDARD: LazyLock<PermissionSet> = LazyLock::new(PermissionSet::build_standard);

const CRM_READ: &[&str] = &[
    "customers:read",
    "contacts:read",
    "deals:read",
    "offers:read",
    "projects:read",
    "budgets:read",
    "activities:read",
];

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table shipped with the API.
    pub fn standard() -> &'static PermissionSet {
        &STANDARD
    }

    /// Add `permissions` to `role`'s grant set.
    pub fn grant<I, P>(mut self, role: Role, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Cow<'static, str>>,
    {
        self.grants
            .entry(role)
            .or_default()
            .extend(permissions.into_iter().map(Permission::new));
        self
    }

    /// Permissions granted to a single role (empty for unknown roles).
    pub fn permissions_for(&self, role: &Role) -> impl Iterator<Item = &Permission> {
        self.grants.get(role).into_iter().flatten()
    }

    /// Whether `role` grants `permission`, either directly or via the wildcard.
    pub fn role_grants(&self, role: &Role, permission: &Permission) -> bool {
        self.grants
            .get(role)
            .is_some_and(|perms| perms.contains(&Permission::WILDCARD) || perms.contains(permission))
    }

    /// Roles known to this set, sorted by name.
    pub fn roles(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.grants.keys().collect();
        roles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        roles
    }

    fn build_standard() -> Self {
        let project_work = CRM_READ.iter().copied().chain([
            "contacts:write",
            "projects:write",
            "budgets:write",
            "activities:write",
            "reports:view",
        ]);

        Self::new()
            .grant(Role::SUPER_ADMIN, ["*"])
            .grant(
                Role::COMPANY_ADMIN,
                CRM_READ.iter().copied().chain([
                    "customers:write",
                    "customers:delete",
                    "contacts:write",
                    "contacts:delete",
                    "deals:write",
                    "deals:delete",
                    "offers:write",
                    "offers:delete",
                    "offers:approve",
                    "projects:write",
                    "projects:delete",
                    "budgets:write",
                    "activities:write",
                    "activities:delete",
                    "users:read",
                    "users:write",
                    "users:manage_roles",
                    "companies:read",
                    "reports:view",
                    "reports:export",
                    "system:audit_logs",
                ]),
            )
            .grant(
                Role::MANAGER,
                CRM_READ.iter().copied().chain([
                    "customers:write",
                    "contacts:write",
                    "deals:write",
                    "offers:write",
                    "offers:approve",
                    "projects:write",
                    "budgets:write",
                    "activities:write",
                    "users:read",
                    "reports:view",
                    "reports:export",
                ]),
            )
            .grant(
                Role::MARKET,
                CRM_READ.iter().copied().chain([
                    "customers:write",
                    "contacts:write",
                    "deals:write",
                    "offers:write",
                    "activities:write",
                    "reports:view",
                ]),
            )
            .grant(Role::PROJECT_MANAGER, project_work.clone())
            .grant(Role::PROJECT_LEADER, project_work)
            .grant(Role::VIEWER, CRM_READ.iter().copied().chain(["reports:view"]))
            .grant(
                Role::API_SERVICE,
                CRM_READ.iter().copied().chain([
                    "customers:write",
                    "contacts:write",
                    "deals:write",
                    "offers:write",
                    "projects:write",
                    "budgets:write",
                    "activities:write",
                ]),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_splits_into_resource_and_action() {
        let p = Permission::of("offers", "approve");
        assert_eq!(p.as_str(), "offers:approve");
        assert_eq!(p.resource(), Some("offers"));
        assert_eq!(p.action(), Some("approve"));
        assert_eq!(Permission::WILDCARD.resource(), None);
    }

    #[test]
    fn super_admin_holds_the_wildcard() {
        let set = PermissionSet::standard();
        assert!(set.role_grants(&Role::SUPER_ADMIN, &Permission::of("system", "admin")));
        assert!(set.role_grants(&Role::SUPER_ADMIN, &Permission::of("anything", "at_all")));
    }

    #[test]
    fn viewer_is_read_only() {
        let set = PermissionSet::standard();
        assert!(set.role_grants(&Role::VIEWER, &Permission::of("customers", "read")));
        assert!(!set.role_grants(&Role::VIEWER, &Permission::of("customers", "write")));
        assert!(!set.role_grants(&Role::VIEWER, &Permission::of("customers", "delete")));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let set = PermissionSet::standard();
        let role = Role::new("intern");
        assert!(!set.role_grants(&role, &Permission::of("customers", "read")));
        assert_eq!(set.permissions_for(&role).count(), 0);
    }

    #[test]
    fn only_admins_can_approve_offers_or_read_audit_logs() {
        let set = PermissionSet::standard();
        let approve = Permission::of("offers", "approve");
        let audit = Permission::of("system", "audit_logs");
        assert!(set.role_grants(&Role::COMPANY_ADMIN, &audit));
        assert!(set.role_grants(&Role::MANAGER, &approve));
        assert!(!set.role_grants(&Role::MARKET, &approve));
        assert!(!set.role_grants(&Role::MANAGER, &audit));
    }
}
