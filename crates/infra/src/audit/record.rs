use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use relation_auth::PrincipalId;
use relation_core::{AuditRecordId, CompanyId, EntityId, RequestId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Read,
}

impl AuditAction {
    /// Action implied by an HTTP method. Read-only methods map to `Read`.
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "POST" => Some(AuditAction::Create),
            "PUT" | "PATCH" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            "GET" => Some(AuditAction::Read),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Read => "read",
        }
    }
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub occurred_at: DateTime<Utc>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<EntityId>,
    pub user_id: Option<PrincipalId>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub company: Option<CompanyId>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub payload: Option<Value>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: RequestId,
}

impl AuditRecord {
    pub fn succeeded(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Field names never persisted in a payload snapshot (compared case-insensitively).
pub const SENSITIVE_FIELDS: &[&str] = &["password", "secret", "token", "apikey"];

/// Route segment → entity type.
const ENTITY_TYPES: &[(&str, &str)] = &[
    ("customers", "Customer"),
    ("contacts", "Contact"),
    ("projects", "Project"),
    ("offers", "Offer"),
    ("files", "File"),
    ("users", "User"),
    ("roles", "UserRole"),
    ("permissions", "UserPermission"),
    ("deals", "Deal"),
    ("activities", "Activity"),
];

pub const UNKNOWN_ENTITY: &str = "Unknown";

pub fn entity_type_for_segment(segment: &str) -> &'static str {
    ENTITY_TYPES
        .iter()
        .find(|(name, _)| *name == segment)
        .map(|(_, entity)| *entity)
        .unwrap_or(UNKNOWN_ENTITY)
}

/// Entity type and id of a request.
///
/// The matched route pattern (`/customers/{id}`) is preferred; without one the
/// raw path is split naively. The id comes from the `id` route parameter, or
/// from the first UUID-shaped segment after the resource segment.
pub fn infer_entity(
    path: &str,
    matched_route: Option<&str>,
    id_param: Option<&str>,
) -> (&'static str, Option<EntityId>) {
    let pattern = matched_route.unwrap_or(path);
    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|s| !s.is_empty() && !is_route_param(s))
        .skip_while(|s| *s == "api" || is_version_segment(s))
        .collect();

    let entity_type = segments
        .iter()
        .map(|s| entity_type_for_segment(s))
        .find(|t| *t != UNKNOWN_ENTITY)
        .unwrap_or(UNKNOWN_ENTITY);

    let from_param = id_param.and_then(|raw| Uuid::parse_str(raw).ok());
    let entity_id = from_param
        .or_else(|| {
            path.split('/')
                .filter(|s| !s.is_empty())
                .find_map(|s| Uuid::parse_str(s).ok())
        })
        .map(EntityId::from_uuid);

    (entity_type, entity_id)
}

fn is_route_param(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('{') || segment.starts_with('*')
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// Remove sensitive fields at any depth.
pub fn sanitize_payload(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_sensitive(key))
                .map(|(key, value)| (key, sanitize_payload(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_payload).collect()),
        other => other,
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_FIELDS
        .iter()
        .any(|field| key.eq_ignore_ascii_case(field))
}

/// Parse a buffered request body into a sanitized snapshot.
///
/// Bodies that are empty or not JSON yield no snapshot.
pub fn payload_snapshot(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<Value>(body).ok().map(sanitize_payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn methods_map_to_actions() {
        assert_eq!(AuditAction::from_method("POST"), Some(AuditAction::Create));
        assert_eq!(AuditAction::from_method("put"), Some(AuditAction::Update));
        assert_eq!(AuditAction::from_method("PATCH"), Some(AuditAction::Update));
        assert_eq!(AuditAction::from_method("DELETE"), Some(AuditAction::Delete));
        assert_eq!(AuditAction::from_method("OPTIONS"), None);
    }

    #[test]
    fn entity_type_from_route_pattern() {
        let id = "0191d7a0-8d3e-7c2a-9b1e-3f4a5b6c7d8e";
        let (entity, entity_id) =
            infer_entity(&format!("/api/v1/offers/{id}"), Some("/api/v1/offers/:id"), Some(id));
        assert_eq!(entity, "Offer");
        assert_eq!(entity_id.map(|e| e.to_string()), Some(id.to_string()));
    }

    #[test]
    fn entity_falls_back_to_raw_path() {
        let id = "0191d7a0-8d3e-7c2a-9b1e-3f4a5b6c7d8e";
        let (entity, entity_id) = infer_entity(&format!("/customers/{id}/contacts"), None, None);
        assert_eq!(entity, "Customer");
        assert!(entity_id.is_some());

        assert_eq!(infer_entity("/widgets", None, None), (UNKNOWN_ENTITY, None));
        assert_eq!(infer_entity("/roles", None, Some("not-a-uuid")), ("UserRole", None));
    }

    #[test]
    fn sensitive_fields_are_stripped_at_any_depth() {
        let body = json!({
            "name": "Acme",
            "Password": "hunter2",
            "contact": { "email": "a@b.no", "apiKey": "k", "tokens": 3 },
            "items": [{ "secret": "s", "qty": 1 }],
        });
        assert_eq!(
            sanitize_payload(body),
            json!({
                "name": "Acme",
                "contact": { "email": "a@b.no", "tokens": 3 },
                "items": [{ "qty": 1 }],
            })
        );
    }

    #[test]
    fn non_json_body_yields_no_snapshot() {
        assert_eq!(payload_snapshot(b""), None);
        assert_eq!(payload_snapshot(b"not json"), None);
        assert_eq!(payload_snapshot(br#"{"token":"x","a":1}"#), Some(json!({ "a": 1 })));
    }
}
