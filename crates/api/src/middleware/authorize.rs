use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::app::errors::auth_error_to_response;

use super::context_of;

/// Enforce the route's guard, if any.
pub async fn authorize(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(guard) = state.routes.guard(req.method(), req.uri().path()) {
        let ctx = context_of(&req);
        if let Err(err) = guard.check(ctx.principal()) {
            debug!(
                path = %req.uri().path(),
                user_id = ?ctx.principal().map(|p| p.id),
                error = %err,
                "route guard denied request"
            );
            return auth_error_to_response(&err);
        }
    }
    next.run(req).await
}
