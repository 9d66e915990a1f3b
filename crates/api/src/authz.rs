//! Route access policy: which routes need a principal, and which capability.
//!
//! Rules are matched in order against the request method and path; the first
//! match wins. Unmatched routes require authentication and nothing else.

use axum::http::Method;

use relation_auth::{AuthError, Permission, Principal, Role, authorize, has_role, is_admin};
use relation_infra::path_matches;

/// How a route treats credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Credentials are ignored.
    Public,
    /// Valid credentials attach a principal; invalid ones are ignored.
    Optional,
    /// A valid principal is mandatory.
    Required,
}

/// Capability a principal must hold for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    AnyRole(Vec<Role>),
    Permission(Permission),
    Admin,
}

impl Guard {
    pub fn require_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Guard::AnyRole(roles.into_iter().collect())
    }

    pub fn require_permission(resource: &str, action: &str) -> Self {
        Guard::Permission(Permission::of(resource, action))
    }

    pub fn require_admin() -> Self {
        Guard::Admin
    }

    pub fn check(&self, principal: Option<&Principal>) -> Result<(), AuthError> {
        let principal =
            principal.ok_or_else(|| AuthError::forbidden("authentication required"))?;
        match self {
            Guard::AnyRole(roles) if has_role(principal, roles) => Ok(()),
            Guard::AnyRole(_) => Err(AuthError::forbidden("insufficient role")),
            Guard::Permission(permission) => authorize(principal, permission),
            Guard::Admin if is_admin(principal) => Ok(()),
            Guard::Admin => Err(AuthError::forbidden("administrator role required")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    method: Option<Method>,
    path: String,
    auth: AuthMode,
    guard: Option<Guard>,
}

impl RouteRule {
    /// `path` is exact, or a prefix when written with a trailing `/*`.
    pub fn new(method: Option<Method>, path: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            method,
            path: path.into(),
            auth,
            guard: None,
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && path_matches(&self.path, path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    fn find(&self, method: &Method, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(method, path))
    }

    pub fn auth_mode(&self, method: &Method, path: &str) -> AuthMode {
        self.find(method, path)
            .map(|rule| rule.auth)
            .unwrap_or(AuthMode::Required)
    }

    pub fn guard(&self, method: &Method, path: &str) -> Option<&Guard> {
        self.find(method, path).and_then(|rule| rule.guard.as_ref())
    }

    /// Policy for the routes this service exposes.
    pub fn standard() -> Self {
        Self::new()
            .rule(RouteRule::new(None, "/health/*", AuthMode::Public))
            .rule(RouteRule::new(None, "/whoami", AuthMode::Optional))
            .rule(
                RouteRule::new(Some(Method::GET), "/customers/*", AuthMode::Required)
                    .guarded(Guard::require_permission("customers", "read")),
            )
            .rule(
                RouteRule::new(Some(Method::POST), "/customers/*", AuthMode::Required)
                    .guarded(Guard::require_permission("customers", "write")),
            )
            .rule(
                RouteRule::new(Some(Method::DELETE), "/customers/*", AuthMode::Required)
                    .guarded(Guard::require_permission("customers", "delete")),
            )
            .rule(
                RouteRule::new(None, "/admin/*", AuthMode::Required)
                    .guarded(Guard::require_admin()),
            )
    }
}
