use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use relation_auth::AuthError;
use relation_infra::Decision;

use crate::app::AppState;
use crate::app::errors::auth_error_to_response;
use crate::context::RequestContext;

use super::context_of;

/// Charge the caller's address before any credential is examined.
pub async fn limit_by_address(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ctx = context_of(&req);
    let decision = state
        .rate_limiter
        .check_address(&ctx.client().ip, req.uri().path());
    if let Some(denied) = deny(decision, &req, &ctx) {
        return denied;
    }
    next.run(req).await
}

/// Charge the principal's budget; anonymous requests pass through.
pub async fn limit_by_principal(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = context_of(&req);
    if let Some(principal) = ctx.principal() {
        let decision = state.rate_limiter.check_principal(
            &ctx.client().ip,
            req.uri().path(),
            &principal.id.to_string(),
        );
        if let Some(denied) = deny(decision, &req, &ctx) {
            return denied;
        }
    }
    next.run(req).await
}

fn deny(decision: Decision, req: &Request, ctx: &RequestContext) -> Option<Response> {
    let retry_after_secs = decision.retry_after_secs()?;
    let user_id = ctx.principal().map(|principal| principal.id.to_string());
    warn!(
        path = %req.uri().path(),
        method = %req.method(),
        client_ip = %ctx.client().ip,
        user_id = user_id.as_deref().unwrap_or("anonymous"),
        retry_after_secs,
        "rate limit exceeded"
    );
    Some(auth_error_to_response(&AuthError::RateLimited { retry_after_secs }))
}
