//! Client-IP extraction and bearer-token authorization
//!
//! Beacons usually arrive through a reverse proxy or CDN, so the proxy
//! headers are consulted before the socket address.

use axum::http::{header, HeaderMap};
use std::net::IpAddr;

use super::AppState;
use crate::db::Site;
use crate::error::AppError;

/// Get the real client IP address, checking proxy headers first.
/// Priority: CF-Connecting-IP > X-Real-IP > X-Forwarded-For (first public
/// entry) > socket address.
pub fn client_ip(headers: &HeaderMap, fallback_ip: &str) -> String {
    for name in ["cf-connecting-ip", "x-real-ip"] {
        if let Some(ip) = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(valid_ip)
        {
            return ip;
        }
    }

    // X-Forwarded-For may carry a chain; the first public hop is the client
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        for entry in forwarded.split(',') {
            if let Some(ip) = valid_ip(entry) {
                if !is_private(&ip) {
                    return ip;
                }
            }
        }
    }

    fallback_ip.to_string()
}

fn valid_ip(raw: &str) -> Option<String> {
    raw.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn is_private(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        Ok(IpAddr::V6(v6)) => v6.is_loopback() || v6.is_unspecified(),
        Err(_) => false,
    }
}

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Admin-only endpoints (site management).
pub fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    if token == state.admin_token {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Per-site endpoints: the admin token or the site's own API key. A valid
/// token for the wrong site gets the same 404 as a missing site, so site
/// existence does not leak.
pub async fn authorize_site(
    state: &AppState,
    headers: &HeaderMap,
    site_id: i64,
) -> Result<Site, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let site = state.db.get_site(site_id).await?.ok_or(AppError::NotFound)?;
    if token == state.admin_token || token == site.api_key {
        Ok(site)
    } else {
        Err(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn cf_header_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "198.51.100.9"),
            ("x-real-ip", "203.0.113.5"),
        ]);
        assert_eq!(client_ip(&map, "10.0.0.1"), "198.51.100.9");
    }

    #[test]
    fn forwarded_for_skips_private_hops() {
        let map = headers(&[("x-forwarded-for", "10.0.0.5, 203.0.113.5, 198.51.100.1")]);
        assert_eq!(client_ip(&map, "127.0.0.1"), "203.0.113.5");
    }

    #[test]
    fn invalid_headers_fall_back_to_socket() {
        let map = headers(&[("x-real-ip", "not-an-ip")]);
        assert_eq!(client_ip(&map, "192.0.2.7"), "192.0.2.7");
    }

    #[test]
    fn bearer_token_parsing() {
        let map = headers(&[("authorization", "Bearer abc123")]);
        assert_eq!(bearer_token(&map), Some("abc123"));

        let map = headers(&[("authorization", "Basic abc123")]);
        assert_eq!(bearer_token(&map), None);

        let map = headers(&[("authorization", "Bearer ")]);
        assert_eq!(bearer_token(&map), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
