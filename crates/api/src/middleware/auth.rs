use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use relation_auth::{AuthError, Credentials};

use crate::app::AppState;
use crate::app::errors::auth_error_to_response;
use crate::authz::AuthMode;

use super::context_of;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const COMPANY_HEADER: &str = "x-company-id";
const AUTHORIZATION_HEADER: &str = "authorization";

/// Authentication failure on a route that requires a principal, turned into
/// a 401 by [`require_authentication`].
#[derive(Debug, Clone)]
pub struct AuthFailure(pub AuthError);

fn credentials(headers: &HeaderMap) -> Credentials<'_> {
    let header = |name: &'static str| headers.get(name).and_then(|value| value.to_str().ok());
    Credentials {
        api_key: header(API_KEY_HEADER),
        authorization: header(AUTHORIZATION_HEADER),
        company_override: header(COMPANY_HEADER),
    }
}

/// Resolve the principal for the route's [`AuthMode`]; never rejects.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let mode = state.routes.auth_mode(req.method(), req.uri().path());
    let credentials = credentials(req.headers());
    let started = Instant::now();

    let (principal, failure) = match mode {
        AuthMode::Public => (None, None),
        AuthMode::Optional => (state.authenticator.optional(credentials).await, None),
        AuthMode::Required => match state.authenticator.require(credentials).await {
            Ok(principal) => (Some(principal), None),
            Err(err) => (None, Some(err)),
        },
    };

    if let Some(principal) = &principal {
        let roles: Vec<&str> = principal.roles.iter().map(|role| role.as_str()).collect();
        info!(
            auth_type = principal.auth_method.as_str(),
            user_id = %principal.id,
            roles = ?roles,
            duration_ms = started.elapsed().as_millis() as u64,
            "request authenticated"
        );
    }
    if let Some(err) = &failure {
        warn!(
            path = %req.uri().path(),
            code = err.code(),
            "authentication failed"
        );
    }

    let ctx = context_of(&req).with_principal(principal.map(Arc::new));
    req.extensions_mut().insert(ctx);
    if let Some(err) = failure {
        req.extensions_mut().insert(AuthFailure(err));
    }
    next.run(req).await
}

/// Reject requests whose required authentication failed.
pub async fn require_authentication(req: Request, next: Next) -> Response {
    if let Some(AuthFailure(err)) = req.extensions().get::<AuthFailure>() {
        debug!(error = %err, "rejecting unauthenticated request");
        return auth_error_to_response(err);
    }
    next.run(req).await
}
