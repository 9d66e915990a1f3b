//! Tenant-scoped demonstration resource.
//!
//! Handlers never look at the principal's company themselves; every scoping
//! decision goes through the [`CompanyFilter`] in the request context.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use relation_auth::{AuthError, CompanyFilter};
use relation_core::{CompanyId, EntityId};

use crate::app::errors::{auth_error_to_response, json_error};
use crate::context::RequestContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: EntityId,
    pub company_id: CompanyId,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Owning company; only honored when the filter leaves a choice.
    #[serde(default)]
    pub company_id: Option<String>,
}

/// In-memory customer table.
#[derive(Debug, Clone, Default)]
pub struct CustomerStore {
    customers: Arc<RwLock<HashMap<EntityId, Customer>>>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id, customer);
    }

    pub async fn list(&self, filter: &CompanyFilter) -> Vec<Customer> {
        let mut items: Vec<Customer> = self
            .customers
            .read()
            .await
            .values()
            .filter(|customer| filter.allows(customer.company_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// Out-of-scope customers are indistinguishable from missing ones.
    pub async fn get(&self, filter: &CompanyFilter, id: EntityId) -> Option<Customer> {
        self.customers
            .read()
            .await
            .get(&id)
            .filter(|customer| filter.allows(customer.company_id))
            .cloned()
    }

    pub async fn remove(&self, filter: &CompanyFilter, id: EntityId) -> Option<Customer> {
        let mut customers = self.customers.write().await;
        if !customers.get(&id).is_some_and(|c| filter.allows(c.company_id)) {
            return None;
        }
        customers.remove(&id)
    }
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/:id", get(get_customer).delete(delete_customer))
}

fn scope(ctx: &RequestContext) -> Result<CompanyFilter, Response> {
    ctx.company_filter()
        .copied()
        .ok_or_else(|| auth_error_to_response(&AuthError::unauthorized("authentication required")))
}

fn parse_id(raw: &str) -> Result<EntityId, Response> {
    raw.parse::<EntityId>().map_err(|_| {
        json_error(StatusCode::BAD_REQUEST, "invalid_id", "id must be a UUID")
    })
}

fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", "customer not found")
}

pub async fn list_customers(
    Extension(store): Extension<CustomerStore>,
    ctx: RequestContext,
) -> Response {
    let filter = match scope(&ctx) {
        Ok(filter) => filter,
        Err(response) => return response,
    };
    let items = store.list(&filter).await;
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn create_customer(
    Extension(store): Extension<CustomerStore>,
    ctx: RequestContext,
    Json(body): Json<CreateCustomerRequest>,
) -> Response {
    let filter = match scope(&ctx) {
        Ok(filter) => filter,
        Err(response) => return response,
    };

    let requested = match body.company_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<CompanyId>() {
            Ok(company) => Some(company),
            Err(_) => {
                return auth_error_to_response(&AuthError::bad_request(format!(
                    "Invalid company_id: {raw}"
                )));
            }
        },
        None => None,
    };

    let company_id = match (filter.company(), requested) {
        (Some(scoped), Some(requested)) if scoped != requested => {
            return auth_error_to_response(&AuthError::forbidden(format!(
                "You do not have access to company {requested}"
            )));
        }
        (Some(scoped), _) => scoped,
        (None, Some(requested)) => requested,
        (None, None) => match ctx.principal() {
            Some(principal) => principal.home_company,
            None => CompanyId::Gruppen,
        },
    };

    if body.name.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "validation_error", "name is required");
    }

    let customer = Customer {
        id: EntityId::new(),
        company_id,
        name: body.name.trim().to_string(),
        email: body.email,
        created_at: Utc::now(),
    };
    store.insert(customer.clone()).await;
    (StatusCode::CREATED, Json(customer)).into_response()
}

pub async fn get_customer(
    Extension(store): Extension<CustomerStore>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Response {
    let (filter, id) = match scope(&ctx).and_then(|filter| Ok((filter, parse_id(&id)?))) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    match store.get(&filter, id).await {
        Some(customer) => (StatusCode::OK, Json(customer)).into_response(),
        None => not_found(),
    }
}

pub async fn delete_customer(
    Extension(store): Extension<CustomerStore>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Response {
    let (filter, id) = match scope(&ctx).and_then(|filter| Ok((filter, parse_id(&id)?))) {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    match store.remove(&filter, id).await {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(company_id: CompanyId, name: &str) -> Customer {
        Customer {
            id: EntityId::new(),
            company_id,
            name: name.to_string(),
            email: None,
            created_at: Utc::now(),
        }
    }

    fn scoped(company: CompanyId) -> CompanyFilter {
        CompanyFilter {
            company: Some(company),
            requested_by_umbrella: false,
        }
    }

    #[tokio::test]
    async fn list_honors_filter() {
        let store = CustomerStore::new();
        store.insert(customer(CompanyId::Tak, "Roof AS")).await;
        store.insert(customer(CompanyId::Stalbygg, "Steel AS")).await;

        assert_eq!(store.list(&CompanyFilter::unrestricted()).await.len(), 2);
        let tak = store.list(&scoped(CompanyId::Tak)).await;
        assert_eq!(tak.len(), 1);
        assert_eq!(tak[0].name, "Roof AS");
    }

    #[tokio::test]
    async fn out_of_scope_rows_are_invisible_and_undeletable() {
        let store = CustomerStore::new();
        let row = customer(CompanyId::Tak, "Roof AS");
        let id = row.id;
        store.insert(row).await;

        let other = scoped(CompanyId::Stalbygg);
        assert!(store.get(&other, id).await.is_none());
        assert!(store.remove(&other, id).await.is_none());
        assert!(store.get(&scoped(CompanyId::Tak), id).await.is_some());
        assert!(store.remove(&CompanyFilter::unrestricted(), id).await.is_some());
        assert!(store.get(&CompanyFilter::unrestricted(), id).await.is_none());
    }
}
