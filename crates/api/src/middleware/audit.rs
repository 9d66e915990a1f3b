use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use relation_auth::CompanyFilter;
use relation_core::{AuditRecordId, EntityId};
use relation_infra::audit::record::{infer_entity, payload_snapshot};
use relation_infra::{AuditAction, AuditError, AuditPolicy, AuditRecord};

use crate::app::AppState;
use crate::app::errors::json_error;
use crate::context::RequestContext;

use super::context_of;

/// Largest request body buffered for a payload snapshot.
pub const MAX_AUDITED_BODY: usize = 1024 * 1024;

/// Record the request after the handler responds, without waiting on storage.
pub async fn audit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(dispatcher) = state.audit.clone() else {
        return next.run(req).await;
    };
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let Some(action) = AuditAction::from_method(&method)
        .filter(|_| state.audit_policy.should_capture(&method, &path))
    else {
        return next.run(req).await;
    };

    let ctx = context_of(&req);
    let (mut parts, body) = req.into_parts();
    let matched_route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());
    let id_param = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(name, _)| *name == "id")
                .map(|(_, value)| value.to_string())
        });

    let (body, payload) = if AuditPolicy::captures_body(&method) {
        match to_bytes(body, MAX_AUDITED_BODY).await {
            Ok(bytes) => {
                let payload = payload_snapshot(&bytes);
                (Body::from(bytes), payload)
            }
            Err(err) => {
                debug!(error = %err, "request body rejected while buffering for audit");
                return json_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "payload_too_large",
                    "request body too large",
                );
            }
        }
    } else {
        (body, None)
    };

    let response = next.run(Request::from_parts(parts, body)).await;

    let status = response.status().as_u16();
    if !state.audit_policy.should_record(status) {
        return response;
    }

    let (entity_type, entity_id) = infer_entity(&path, matched_route.as_deref(), id_param.as_deref());
    let record = build_record(
        &ctx,
        response.extensions().get::<CompanyFilter>(),
        action,
        entity_type,
        entity_id,
        method,
        path,
        status,
        payload,
    );

    match dispatcher.dispatch(record) {
        Ok(()) | Err(AuditError::QueueFull) => {}
        Err(err) => warn!(error = %err, "audit record not enqueued"),
    }
    response
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    ctx: &RequestContext,
    filter: Option<&CompanyFilter>,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<EntityId>,
    method: String,
    path: String,
    status: u16,
    payload: Option<Value>,
) -> AuditRecord {
    let principal = ctx.principal();
    AuditRecord {
        id: AuditRecordId::new(),
        occurred_at: Utc::now(),
        action,
        entity_type: entity_type.to_string(),
        entity_id,
        user_id: principal.map(|p| p.id),
        user_email: principal.map(|p| p.email.clone()),
        user_name: principal.map(|p| p.display_name.clone()),
        company: filter
            .and_then(CompanyFilter::company)
            .or(principal.map(|p| p.home_company)),
        method,
        path,
        status,
        payload,
        client_ip: Some(ctx.client().ip.clone()).filter(|ip| !ip.is_empty()),
        user_agent: ctx.client().user_agent.clone(),
        request_id: ctx.request_id(),
    }
}
