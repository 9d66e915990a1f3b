//! Claim extraction from a verified token payload.
//!
//! Identity providers disagree on claim names, so every field is read from an
//! ordered list of alternatives and the first non-empty value wins.

use serde::Deserialize;
use serde_json::{Map, Value};

pub const ID_CLAIMS: &[&str] = &["oid", "sub"];
pub const EMAIL_CLAIMS: &[&str] = &["email", "upn", "unique_name"];
pub const NAME_CLAIMS: &[&str] = &["name", "unique_name", "preferred_username"];
pub const ROLE_CLAIMS: &[&str] = &["roles", "role"];
pub const SCOPE_CLAIMS: &[&str] = &["scp", "scope"];
pub const COMPANY_CLAIMS: &[&str] = &["company_id", "companyId", "extension_companyId"];

/// Verified claims of a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// First non-empty string among `names`.
    pub fn first_string(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.0.get(*name).and_then(Value::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// `aud` as a list, whether issued as a string or an array.
    pub fn audiences(&self) -> Vec<&str> {
        string_or_list(self.0.get("aud"))
    }

    pub fn issuer(&self) -> Option<&str> {
        self.first_string(&["iss"])
    }

    /// Space-delimited scopes from the first scope claim present.
    pub fn scopes(&self) -> Vec<&str> {
        self.first_string(SCOPE_CLAIMS)
            .map(|raw| raw.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Roles from a list-valued or single-string claim.
    pub fn roles(&self) -> Vec<&str> {
        ROLE_CLAIMS
            .iter()
            .map(|name| string_or_list(self.0.get(*name)))
            .find(|roles| !roles.is_empty())
            .unwrap_or_default()
    }
}

fn string_or_list(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// `true` if `scopes` contains at least one of `required` (ASCII case-insensitive).
///
/// An empty `required` list always passes.
pub fn has_required_scope(scopes: &[&str], required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    required
        .iter()
        .any(|want| scopes.iter().any(|have| have.eq_ignore_ascii_case(want)))
}
