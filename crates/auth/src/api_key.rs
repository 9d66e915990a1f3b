//! API Key Authenticator: one shared secret, compared in constant time.

use subtle::ConstantTimeEq;

use relation_core::CompanyId;

use crate::Principal;

#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    secret: Option<Vec<u8>>,
}

impl ApiKeyAuthenticator {
    /// An empty secret disables API-key authentication entirely.
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            secret: (!secret.is_empty()).then(|| secret.into_bytes()),
        }
    }

    pub fn disabled() -> Self {
        Self { secret: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// The system principal when `presented` matches, else `None`.
    ///
    /// `company_override` narrows the principal's home company for this
    /// request only.
    pub fn authenticate(
        &self,
        presented: &str,
        company_override: Option<CompanyId>,
    ) -> Option<Principal> {
        let secret = self.secret.as_deref()?;
        let matches: bool = secret.ct_eq(presented.as_bytes()).into();
        matches.then(|| Principal::system(company_override))
    }
}

impl core::fmt::Debug for ApiKeyAuthenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiKeyAuthenticator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
