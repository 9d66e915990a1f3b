//! HTTP application wiring: shared state, the middleware pipeline and routes.
//!
//! - `routes/`: handlers, one file per area
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    middleware::{from_fn, from_fn_with_state},
};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;

use relation_auth::{ApiKeyAuthenticator, Authenticator, KeySetCache, KeySetError, TokenValidator};
use relation_infra::{
    AuditDispatcher, AuditPolicy, AuditSink, HttpKeySetSource, RateLimiter,
};

use crate::authz::RoutePolicy;
use crate::config::AppConfig;
use crate::middleware;

pub mod errors;
pub mod routes;

use routes::customers::CustomerStore;

/// Shared services handed to every pipeline stage.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
    /// `None` disables auditing.
    pub audit: Option<AuditDispatcher>,
    pub audit_policy: Arc<AuditPolicy>,
    pub routes: Arc<RoutePolicy>,
    pub customers: CustomerStore,
}

impl AppState {
    /// State with the standard route policy and auditing off.
    pub fn new(authenticator: Authenticator, rate_limiter: RateLimiter) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            rate_limiter: Arc::new(rate_limiter),
            audit: None,
            audit_policy: Arc::new(AuditPolicy::default()),
            routes: Arc::new(RoutePolicy::standard()),
            customers: CustomerStore::new(),
        }
    }

    pub fn with_audit(mut self, dispatcher: AuditDispatcher, policy: AuditPolicy) -> Self {
        self.audit = Some(dispatcher);
        self.audit_policy = Arc::new(policy);
        self
    }

    pub fn with_routes(mut self, routes: RoutePolicy) -> Self {
        self.routes = Arc::new(routes);
        self
    }

    /// Wire production services from configuration.
    ///
    /// Spawns the audit workers, so it must run inside a tokio runtime. The
    /// returned handles belong to those workers.
    pub fn from_config(
        config: &AppConfig,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Result<(Self, Vec<JoinHandle<()>>), KeySetError> {
        let source = HttpKeySetSource::with_timeout(
            config.auth.jwks_url(),
            config.auth.keyset_fetch_timeout,
        )?;
        let keys = KeySetCache::new(Arc::new(source))
            .with_ttl(config.auth.keyset_ttl)
            .with_fetch_timeout(config.auth.keyset_fetch_timeout);
        let tokens = TokenValidator::new(Arc::new(keys), config.auth.token_validator_config());
        let authenticator =
            Authenticator::new(ApiKeyAuthenticator::new(config.auth.api_key.clone()), tokens);

        let mut state = Self::new(authenticator, RateLimiter::new(config.rate_limit.clone()));
        let mut workers = Vec::new();
        if config.audit.policy.enabled {
            let (dispatcher, handles) = AuditDispatcher::spawn(audit_sink, config.audit.dispatcher);
            state = state.with_audit(dispatcher, config.audit.policy.clone());
            workers = handles;
        }
        Ok((state, workers))
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    // Outermost first; see `crate::middleware` for the stage contract.
    let pipeline = ServiceBuilder::new()
        .layer(from_fn(middleware::request::init_context))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::limit_by_address))
        .layer(from_fn_with_state(state.clone(), middleware::auth::authenticate))
        .layer(from_fn(middleware::auth::require_authentication))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::limit_by_principal))
        .layer(from_fn_with_state(state.clone(), middleware::audit::audit))
        .layer(from_fn_with_state(state.clone(), middleware::authorize::authorize))
        .layer(from_fn(middleware::company_filter::company_filter));

    routes::router()
        .layer(pipeline)
        .layer(Extension(state.customers.clone()))
        .with_state(state)
}
