use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use relation_auth::AuthError;

pub fn auth_error_to_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InvalidToken(_)
        | AuthError::ExpiredToken
        | AuthError::InvalidScope
        | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
    };

    let mut response = json_error(status, err.code(), err.public_message());
    if let AuthError::RateLimited { retry_after_secs } = err {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    response
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (AuthError::invalid_token("bad signature"), StatusCode::UNAUTHORIZED),
            (AuthError::ExpiredToken, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidScope, StatusCode::UNAUTHORIZED),
            (AuthError::unauthorized("missing"), StatusCode::UNAUTHORIZED),
            (AuthError::forbidden("nope"), StatusCode::FORBIDDEN),
            (AuthError::bad_request("Invalid company_id: x"), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(&err).status(), status, "{err}");
        }
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = auth_error_to_response(&AuthError::RateLimited { retry_after_secs: 7 });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
