use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use relation_core::RequestId;

use crate::context::{ClientInfo, RequestContext};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Install a fresh [`RequestContext`] and echo the request id on the response.
pub async fn init_context(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<RequestId>().ok())
        .unwrap_or_default();

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = ClientInfo {
        ip: client_ip(req.headers(), peer),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    req.extensions_mut()
        .insert(RequestContext::new(request_id, client));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Caller address: first forwarded-for entry, then the real-ip header, then the peer.
///
/// Only as trustworthy as the proxy in front of the service.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header_value(FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header_value(REAL_IP) {
        return real.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_first_entry_wins() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        let peer = "127.0.0.1:9000".parse().ok();
        assert_eq!(client_ip(&map, peer), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_peer() {
        let peer: Option<SocketAddr> = "127.0.0.1:9000".parse().ok();
        assert_eq!(
            client_ip(&headers(&[("x-real-ip", "198.51.100.2")]), peer),
            "198.51.100.2"
        );
        assert_eq!(client_ip(&HeaderMap::new(), peer), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
