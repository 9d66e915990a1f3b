//! Authentication/authorization error taxonomy.

use thiserror::Error;

/// Failure of a pipeline stage.
///
/// Carried reasons are for logs only; [`AuthError::public_message`] is what a
/// caller gets to see.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    ExpiredToken,

    #[error("token lacks a required scope")]
    InvalidScope,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limit exceeded (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },
}

impl AuthError {
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken(reason.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::InvalidScope => "invalid_scope",
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::BadRequest(_) => "bad_request",
            AuthError::RateLimited { .. } => "rate_limit_exceeded",
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Token and key-set failures collapse to a fixed text; forbidden and bad
    /// request reasons are composed by this crate and carry no internals.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidToken(_) => "Invalid or unverifiable token".to_string(),
            AuthError::ExpiredToken => "Token has expired".to_string(),
            AuthError::InvalidScope => "Token lacks a required scope".to_string(),
            AuthError::Unauthorized(reason) => reason.clone(),
            AuthError::Forbidden(reason) => reason.clone(),
            AuthError::BadRequest(reason) => reason.clone(),
            AuthError::RateLimited { .. } => {
                "Too many requests. Please try again later.".to_string()
            }
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken(_)
                | AuthError::ExpiredToken
                | AuthError::InvalidScope
                | AuthError::Unauthorized(_)
        )
    }
}

/// Failure to obtain a verification key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetError {
    #[error("key set fetch failed: {0}")]
    Fetch(String),

    #[error("key set fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no signing key with id '{0}'")]
    NotFound(String),
}

impl From<KeySetError> for AuthError {
    fn from(value: KeySetError) -> Self {
        AuthError::InvalidToken(value.to_string())
    }
}
