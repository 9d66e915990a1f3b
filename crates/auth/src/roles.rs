use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles arrive as opaque strings in token claims; unknown roles are carried
/// through unchanged and simply grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Sees and manages every company; implicitly holds every permission.
    pub const SUPER_ADMIN: Role = Role(Cow::Borrowed("super_admin"));
    pub const COMPANY_ADMIN: Role = Role(Cow::Borrowed("company_admin"));
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    pub const MARKET: Role = Role(Cow::Borrowed("market"));
    pub const PROJECT_MANAGER: Role = Role(Cow::Borrowed("project_manager"));
    pub const PROJECT_LEADER: Role = Role(Cow::Borrowed("project_leader"));
    pub const VIEWER: Role = Role(Cow::Borrowed("viewer"));
    /// Trusted backend caller authenticated by API key.
    pub const API_SERVICE: Role = Role(Cow::Borrowed("api_service"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}
