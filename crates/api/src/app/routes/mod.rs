use axum::{Router, routing::get};

use crate::app::AppState;

pub mod customers;
pub mod system;

/// Every route of the service; access rules live in [`crate::authz::RoutePolicy`].
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .route("/admin/status", get(system::status))
        .merge(customers::router())
}
