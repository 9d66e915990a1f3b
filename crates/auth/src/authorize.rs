//! Permission Resolver: pure role/permission checks over a [`Principal`].
//!
//! - No IO
//! - No panics
//! - Static data plus the principal's role set only

use crate::{AuthError, Permission, PermissionSet, Principal, Role};

/// Roles treated as administrative by [`is_admin`].
pub const ADMIN_ROLES: [Role; 2] = [Role::SUPER_ADMIN, Role::COMPANY_ADMIN];

/// `true` if the principal holds any of `roles`.
pub fn has_role(principal: &Principal, roles: &[Role]) -> bool {
    roles.iter().any(|role| principal.has_role(role))
}

/// `true` if any of the principal's roles grants `resource:action` in the
/// standard permission set.
pub fn has_permission(principal: &Principal, resource: &str, action: &str) -> bool {
    has_permission_in(PermissionSet::standard(), principal, &Permission::of(resource, action))
}

/// Same as [`has_permission`] against an explicit permission set.
pub fn has_permission_in(set: &PermissionSet, principal: &Principal, required: &Permission) -> bool {
    principal
        .roles
        .iter()
        .any(|role| set.role_grants(role, required))
}

pub fn is_admin(principal: &Principal) -> bool {
    has_role(principal, &ADMIN_ROLES)
}

/// Authorize a principal for one permission.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthError> {
    if has_permission_in(PermissionSet::standard(), principal, required) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!("missing permission '{required}'")))
    }
}

/// Sorted effective permissions of a principal (wildcard included as `*`).
pub fn effective_permissions(principal: &Principal) -> Vec<String> {
    let set = PermissionSet::standard();
    let mut perms: Vec<String> = principal
        .roles
        .iter()
        .flat_map(|role| set.permissions_for(role))
        .map(|p| p.as_str().to_string())
        .collect();
    perms.sort();
    perms.dedup();
    perms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthMethod, PrincipalId};
    use relation_core::CompanyId;

    fn principal(roles: Vec<Role>) -> Principal {
        Principal {
            id: PrincipalId::from_email("kari@example.com"),
            display_name: "Kari".into(),
            email: "kari@example.com".into(),
            roles,
            home_company: CompanyId::Tak,
            auth_method: AuthMethod::Bearer,
        }
    }

    #[test]
    fn has_role_matches_any() {
        let p = principal(vec![Role::VIEWER, Role::MARKET]);
        assert!(has_role(&p, &[Role::MANAGER, Role::MARKET]));
        assert!(!has_role(&p, &[Role::MANAGER]));
        assert!(!has_role(&p, &[]));
    }

    #[test]
    fn permissions_expand_through_every_role() {
        let p = principal(vec![Role::VIEWER, Role::MARKET]);
        assert!(has_permission(&p, "customers", "write"));
        assert!(has_permission(&p, "budgets", "read"));
        assert!(!has_permission(&p, "budgets", "write"));
    }

    #[test]
    fn principal_without_roles_has_nothing() {
        let p = principal(vec![]);
        assert!(!has_permission(&p, "customers", "read"));
        assert!(!is_admin(&p));
        assert!(effective_permissions(&p).is_empty());
    }

    #[test]
    fn super_admin_is_admin_and_authorized_for_anything() {
        let p = principal(vec![Role::SUPER_ADMIN]);
        assert!(is_admin(&p));
        assert!(authorize(&p, &Permission::of("system", "admin")).is_ok());
        assert_eq!(effective_permissions(&p), vec!["*".to_string()]);
    }

    #[test]
    fn authorize_reports_missing_permission_as_forbidden() {
        let p = principal(vec![Role::VIEWER]);
        let err = authorize(&p, &Permission::of("customers", "delete")).unwrap_err();
        assert_eq!(err, AuthError::forbidden("missing permission 'customers:delete'"));
    }

    #[test]
    fn company_admin_is_admin() {
        assert!(is_admin(&principal(vec![Role::COMPANY_ADMIN])));
        assert!(!is_admin(&principal(vec![Role::MANAGER])));
    }
}
