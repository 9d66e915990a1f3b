//! Request pipeline stages, outermost first:
//!
//! 1. [`request::init_context`]: request id and client facts
//! 2. [`rate_limit::limit_by_address`]: anonymous budget for every caller
//! 3. [`auth::authenticate`]: resolve the principal per the route's auth mode
//! 4. [`auth::require_authentication`]: 401 when required authentication failed
//! 5. [`rate_limit::limit_by_principal`]: authenticated budget
//! 6. [`audit::audit`]: record mutations after the response is produced
//! 7. [`authorize::authorize`]: route guard
//! 8. [`company_filter::company_filter`]: tenant scope for the handler
//!
//! An address over budget is rejected before any token is validated or key
//! fetched.

pub mod audit;
pub mod auth;
pub mod authorize;
pub mod company_filter;
pub mod rate_limit;
pub mod request;

use axum::extract::Request;

use crate::context::RequestContext;

/// Context installed by [`request::init_context`], or a blank one.
pub(crate) fn context_of(req: &Request) -> RequestContext {
    req.extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
}
