//! Credential extraction from the raw request.

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use sluice_auth::RequestCredentials;
use std::net::IpAddr;

/// The session cookie the gateway relays to the auth handler.
pub const SESSION_COOKIE: &str = "sluice_session";

/// Pull the caller's credentials out of the request: `Authorization`
/// header (Bearer or Basic, still encoded), the session cookie (the
/// `cookie` query parameter is an accepted fallback for clients that
/// cannot set headers), the relayed `view_only` parameter and the client
/// address. Values are forwarded opaquely; nothing here validates them.
pub fn credentials(
    headers: &HeaderMap,
    cookie_param: Option<&str>,
    view_only: Option<&str>,
    ip: Option<IpAddr>,
) -> RequestCredentials {
    let mut extracted = RequestCredentials {
        view_only: view_only.map(String::from),
        ip,
        ..Default::default()
    };

    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            extracted.bearer = Some(token.to_string());
        } else if let Some(encoded) = value.strip_prefix("Basic ") {
            extracted.basic = Some(encoded.to_string());
        }
    }

    let jar = CookieJar::from_headers(headers);
    extracted.cookie = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| cookie_param.map(String::from));

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer tok-123".parse().unwrap());
        let creds = credentials(&headers, None, None, None);
        assert_eq!(creds.bearer.as_deref(), Some("tok-123"));
        assert!(creds.basic.is_none());
    }

    #[test]
    fn test_basic_extraction_stays_encoded() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        let creds = credentials(&headers, None, None, None);
        assert_eq!(creds.basic.as_deref(), Some("dXNlcjpwYXNz"));
    }

    #[test]
    fn test_cookie_and_view_only() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("{SESSION_COOKIE}=abc; other=x").parse().unwrap());
        let creds = credentials(&headers, None, Some("vo-key"), None);
        assert_eq!(creds.cookie.as_deref(), Some("abc"));
        assert_eq!(creds.view_only.as_deref(), Some("vo-key"));
    }

    #[test]
    fn test_absent_credentials() {
        let creds = credentials(&HeaderMap::new(), None, None, None);
        assert!(creds.bearer.is_none() && creds.basic.is_none() && creds.cookie.is_none());
    }

    #[test]
    fn test_cookie_query_parameter_fallback() {
        let creds = credentials(&HeaderMap::new(), Some("from-query"), None, None);
        assert_eq!(creds.cookie.as_deref(), Some("from-query"));
    }
}
