//! `relation-auth`: authentication, authorization and tenant scoping.
//!
//! Transport-agnostic: the HTTP layer feeds raw credentials in and gets a
//! [`Principal`] and a [`CompanyFilter`] out. Key fetching is abstracted behind
//! [`KeySetSource`].

pub mod api_key;
pub mod authenticator;
pub mod authorize;
pub mod claims;
pub mod company_filter;
pub mod error;
pub mod keyset;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod token;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use api_key::ApiKeyAuthenticator;
pub use authenticator::{Authenticator, Credentials, parse_bearer};
pub use authorize::{authorize, effective_permissions, has_permission, has_role, is_admin};
pub use claims::Claims;
pub use company_filter::{CompanyFilter, resolve as resolve_company_filter};
pub use error::{AuthError, KeySetError};
pub use keyset::{JwkCollection, JwkEntry, KeySetCache, KeySetSource, KeySnapshot};
pub use permissions::{Permission, PermissionSet};
pub use principal::{AuthMethod, Principal, PrincipalId};
pub use roles::Role;
pub use token::{TokenValidator, TokenValidatorConfig};
