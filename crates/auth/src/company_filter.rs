//! Company Filter Resolver: the effective tenant scope of a request.
//!
//! Data access must consult the resolved [`CompanyFilter`], never the raw
//! principal's home company.

use serde::{Deserialize, Serialize};
use tracing::warn;

use relation_core::CompanyId;

use crate::{AuthError, Principal};

/// Effective tenant restriction for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFilter {
    /// `None` means every company is visible.
    pub company: Option<CompanyId>,
    /// The restriction was chosen by a principal entitled to cross-tenant
    /// access, as opposed to being imposed by a confined home company.
    pub requested_by_umbrella: bool,
}

impl CompanyFilter {
    pub fn unrestricted() -> Self {
        Self {
            company: None,
            requested_by_umbrella: false,
        }
    }

    pub fn company(&self) -> Option<CompanyId> {
        self.company
    }

    pub fn is_restricted(&self) -> bool {
        self.company.is_some()
    }

    /// Whether data owned by `owner` is visible under this filter.
    pub fn allows(&self, owner: CompanyId) -> bool {
        self.company.is_none_or(|company| company == owner)
    }
}

/// Resolve the filter for `principal` and an optional explicit `requested` id.
///
/// Unknown ids fail with `BadRequest` before anything else, whoever asks.
/// Without a principal there is no filter; authentication is enforced upstream.
pub fn resolve(
    principal: Option<&Principal>,
    requested: Option<&str>,
) -> Result<Option<CompanyFilter>, AuthError> {
    let requested = match requested.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(
            raw.parse::<CompanyId>()
                .map_err(|_| AuthError::bad_request(format!("Invalid company_id: {raw}")))?,
        ),
        None => None,
    };

    let Some(principal) = principal else {
        return Ok(None);
    };

    let filter = match requested {
        Some(company) => {
            if !principal.can_access_company(company) {
                warn!(
                    user_id = %principal.id,
                    home_company = %principal.home_company,
                    requested_company = %company,
                    "cross-company access denied"
                );
                return Err(AuthError::forbidden(format!(
                    "You do not have access to company {company}"
                )));
            }
            CompanyFilter {
                company: (company != CompanyId::All).then_some(company),
                requested_by_umbrella: principal.is_umbrella_member(),
            }
        }
        None if principal.home_company.is_restricted() => CompanyFilter {
            company: Some(principal.home_company),
            requested_by_umbrella: false,
        },
        None => CompanyFilter::unrestricted(),
    };

    Ok(Some(filter))
}
