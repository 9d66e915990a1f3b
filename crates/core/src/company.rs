//! The fixed set of companies (tenants) in the group.
//!
//! `Gruppen` is the umbrella (holding) company whose members may see across
//! all subsidiaries. `All` is a pseudo-company meaning "no restriction"; it is
//! a valid request value but never a real data owner.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyId {
    All,
    Gruppen,
    Stalbygg,
    Hybridbygg,
    Industri,
    Tak,
    Montasje,
}

impl CompanyId {
    /// Every identifier accepted from callers, in declaration order.
    pub const KNOWN: [CompanyId; 7] = [
        CompanyId::All,
        CompanyId::Gruppen,
        CompanyId::Stalbygg,
        CompanyId::Hybridbygg,
        CompanyId::Industri,
        CompanyId::Tak,
        CompanyId::Montasje,
    ];

    /// Subsidiaries that own data and confine their members.
    pub const SUBSIDIARIES: [CompanyId; 5] = [
        CompanyId::Stalbygg,
        CompanyId::Hybridbygg,
        CompanyId::Industri,
        CompanyId::Tak,
        CompanyId::Montasje,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyId::All => "all",
            CompanyId::Gruppen => "gruppen",
            CompanyId::Stalbygg => "stalbygg",
            CompanyId::Hybridbygg => "hybridbygg",
            CompanyId::Industri => "industri",
            CompanyId::Tak => "tak",
            CompanyId::Montasje => "montasje",
        }
    }

    /// `true` for the umbrella company and the `all` pseudo-company.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, CompanyId::All | CompanyId::Gruppen)
    }

    /// `true` for a subsidiary whose members are confined to its own data.
    pub fn is_restricted(&self) -> bool {
        !self.is_unrestricted()
    }
}

impl core::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyId {
    type Err = DomainError;

    /// Exact, case-sensitive match against the known identifiers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompanyId::KNOWN
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::invalid_id(format!("CompanyId: unknown company '{s}'")))
    }
}
