use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relation_core::CompanyId;

use crate::Role;

/// Identity of an authenticated principal (human user or the system caller).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Deterministic identity synthesized from an email-like claim.
    ///
    /// Name-based (v5) UUID in the OID namespace: the same input always yields
    /// the same id.
    pub fn from_email(email: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes()))
    }

    /// Sentinel identity of the API-key system principal.
    pub fn system() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Which credential produced the principal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Bearer,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Bearer => "bearer",
        }
    }
}

/// The authenticated identity for one request.
///
/// Created once by the authenticator and never mutated afterwards; downstream
/// stages share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub home_company: CompanyId,
    pub auth_method: AuthMethod,
}

impl Principal {
    pub const SYSTEM_NAME: &'static str = "System";
    pub const SYSTEM_EMAIL: &'static str = "system@straye.io";

    /// The fixed API-key principal, optionally narrowed to one company.
    pub fn system(company: Option<CompanyId>) -> Self {
        Self {
            id: PrincipalId::system(),
            display_name: Self::SYSTEM_NAME.to_string(),
            email: Self::SYSTEM_EMAIL.to_string(),
            roles: vec![Role::SUPER_ADMIN, Role::API_SERVICE],
            home_company: company.unwrap_or(CompanyId::Gruppen),
            auth_method: AuthMethod::ApiKey,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(&Role::SUPER_ADMIN)
    }

    /// Member of the umbrella company, or holder of the cross-tenant override role.
    pub fn is_umbrella_member(&self) -> bool {
        self.home_company.is_unrestricted() || self.is_super_admin()
    }

    pub fn can_access_company(&self, company: CompanyId) -> bool {
        self.is_umbrella_member() || self.home_company == company
    }
}
