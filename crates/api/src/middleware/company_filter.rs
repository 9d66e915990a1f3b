use axum::{
    extract::{Query, Request},
    http::Uri,
    middleware::Next,
    response::Response,
};

use relation_auth::{AuthError, resolve_company_filter};

use crate::app::errors::auth_error_to_response;

use super::context_of;

const COMPANY_PARAM: &str = "company_id";

/// First `company_id` in the query string. Repeats are ignored.
fn requested_company(uri: &Uri) -> Result<Option<String>, AuthError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|_| AuthError::bad_request("Invalid query string"))?;
    Ok(pairs
        .into_iter()
        .find(|(name, _)| name == COMPANY_PARAM)
        .map(|(_, value)| value))
}

/// Resolve the tenant scope from the principal and `?company_id=`.
///
/// The filter is also attached to the response so the audit stage can see
/// the effective company.
pub async fn company_filter(mut req: Request, next: Next) -> Response {
    let ctx = context_of(&req);
    let filter = match requested_company(req.uri())
        .and_then(|requested| resolve_company_filter(ctx.principal(), requested.as_deref()))
    {
        Ok(filter) => filter,
        Err(err) => return auth_error_to_response(&err),
    };

    req.extensions_mut().insert(ctx.with_company_filter(filter));
    let mut response = next.run(req).await;
    if let Some(filter) = filter {
        response.extensions_mut().insert(filter);
    }
    response
}
