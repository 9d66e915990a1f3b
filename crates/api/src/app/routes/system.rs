use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use relation_auth::effective_permissions;

use crate::app::AppState;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Current principal and tenant scope; anonymous callers get `authenticated: false`.
pub async fn whoami(ctx: RequestContext) -> impl IntoResponse {
    let body = match ctx.principal() {
        Some(principal) => json!({
            "authenticated": true,
            "request_id": ctx.request_id(),
            "principal": principal,
            "permissions": effective_permissions(principal),
            "company_filter": ctx.company_filter(),
        }),
        None => json!({
            "authenticated": false,
            "request_id": ctx.request_id(),
        }),
    };
    Json(body)
}

/// Pipeline counters for operators.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let audit = state.audit.as_ref().map(|dispatcher| {
        let stats = dispatcher.stats();
        json!({ "written": stats.written, "failed": stats.failed, "dropped": stats.dropped })
    });
    let keys = state.authenticator.tokens().key_set();
    Json(json!({
        "audit": audit,
        "rate_limit": {
            "enabled": state.rate_limiter.is_enabled(),
            "tracked_keys": state.rate_limiter.tracked_keys(),
        },
        "key_set": {
            "key_ids": keys.key_ids(),
            "refreshes": keys.refresh_count(),
        },
    }))
}
