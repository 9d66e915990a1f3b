//! Per-request context threaded through the middleware chain.
//!
//! Each stage that learns something replaces the [`RequestContext`] in the
//! request extensions with an extended copy; nothing mutates a context another
//! stage already read. Handlers extract it directly.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use relation_auth::{CompanyFilter, Principal};
use relation_core::RequestId;

/// Network-level facts about the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

/// Immutable per-request state visible to downstream stages and handlers.
///
/// Absent principal and absent filter are both valid states (public and
/// optionally-authenticated routes).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: RequestId,
    client: ClientInfo,
    principal: Option<Arc<Principal>>,
    company_filter: Option<CompanyFilter>,
}

impl RequestContext {
    pub fn new(request_id: RequestId, client: ClientInfo) -> Self {
        Self {
            request_id,
            client,
            principal: None,
            company_filter: None,
        }
    }

    pub fn with_principal(&self, principal: Option<Arc<Principal>>) -> Self {
        Self {
            principal,
            ..self.clone()
        }
    }

    pub fn with_company_filter(&self, filter: Option<CompanyFilter>) -> Self {
        Self {
            company_filter: filter,
            ..self.clone()
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    pub fn company_filter(&self) -> Option<&CompanyFilter> {
        self.company_filter.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
