//! Authenticator: combines the API key and bearer token paths.
//!
//! Precedence: a matching API key wins outright; otherwise the bearer token is
//! validated. No credential at all is `Ok(None)`, which the caller turns into
//! `Unauthorized` on protected routes.

use tracing::{debug, warn};

use relation_core::CompanyId;

use crate::{ApiKeyAuthenticator, AuthError, Principal, TokenValidator};

/// Raw credential material lifted from request headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub api_key: Option<&'a str>,
    pub authorization: Option<&'a str>,
    /// Honored only for API-key principals, and only when it names a known company.
    pub company_override: Option<&'a str>,
}

impl Credentials<'_> {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none_or(str::is_empty) && self.authorization.is_none_or(str::is_empty)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::unauthorized("invalid authorization header format"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::unauthorized("invalid authorization header format"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::unauthorized("empty bearer token"));
    }
    Ok(token)
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    api_key: ApiKeyAuthenticator,
    tokens: TokenValidator,
}

impl Authenticator {
    pub fn new(api_key: ApiKeyAuthenticator, tokens: TokenValidator) -> Self {
        Self { api_key, tokens }
    }

    pub fn tokens(&self) -> &TokenValidator {
        &self.tokens
    }

    /// Resolve the principal for a request, if any credential was presented.
    pub async fn authenticate(
        &self,
        credentials: Credentials<'_>,
    ) -> Result<Option<Principal>, AuthError> {
        let mut rejected_api_key = false;

        if let Some(presented) = credentials.api_key.filter(|key| !key.is_empty()) {
            let company = credentials
                .company_override
                .and_then(|raw| raw.parse::<CompanyId>().ok());
            if let Some(principal) = self.api_key.authenticate(presented, company) {
                return Ok(Some(principal));
            }
            warn!("invalid API key attempt");
            rejected_api_key = true;
        }

        match credentials.authorization.filter(|h| !h.is_empty()) {
            Some(header) => {
                let token = parse_bearer(header)?;
                self.tokens.validate(token).await.map(Some)
            }
            None if rejected_api_key => Err(AuthError::unauthorized("invalid API key")),
            None => Ok(None),
        }
    }

    /// Like [`Self::authenticate`] but a missing credential is `Unauthorized`.
    pub async fn require(&self, credentials: Credentials<'_>) -> Result<Principal, AuthError> {
        self.authenticate(credentials)
            .await?
            .ok_or_else(|| AuthError::unauthorized("missing authentication credentials"))
    }

    /// Optional mode: any failure degrades to an anonymous request.
    pub async fn optional(&self, credentials: Credentials<'_>) -> Option<Principal> {
        match self.authenticate(credentials).await {
            Ok(principal) => principal,
            Err(err) => {
                debug!(error = %err, "optional authentication failed, continuing anonymously");
                None
            }
        }
    }
}
