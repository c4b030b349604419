//! Header policy for both directions of a relay
//!
//! Outbound: a copy of the client's headers minus anything tied to the
//! client-to-relay connection. Inbound: permissive CORS and no headers that
//! would constrain or wipe state in the client's browser.

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_SECURITY_POLICY,
    CONTENT_SECURITY_POLICY_REPORT_ONLY, COOKIE, HOST, PROXY_AUTHORIZATION, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE,
};
use url::Url;

/// Methods advertised in preflight responses.
pub const ALLOWED_METHODS: [&str; 8] = [
    "GET", "POST", "PUT", "PATCH", "TRACE", "DELETE", "HEAD", "OPTIONS",
];

pub const PREFLIGHT_MAX_AGE: &str = "1728000";

const CLEAR_SITE_DATA: HeaderName = HeaderName::from_static("clear-site-data");
const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

const HOP_BY_HOP: [HeaderName; 7] = [
    CONNECTION,
    KEEP_ALIVE,
    PROXY_CONNECTION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

const CREDENTIALS: [HeaderName; 3] = [AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE];

/// Headers for the first outbound hop.
pub fn outbound(inbound: &HeaderMap, has_body: bool) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(HOST);
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    if !has_body {
        headers.remove(CONTENT_LENGTH);
    }
    headers
}

/// Fresh header copy for a follow hop from `from` to `to`. Follow hops carry
/// no body, and credentials never cross to another origin.
pub fn for_redirect_hop(previous: &HeaderMap, from: &Url, to: &Url) -> HeaderMap {
    let mut headers = previous.clone();
    headers.remove(CONTENT_LENGTH);
    if from.origin() != to.origin() {
        for name in CREDENTIALS {
            headers.remove(name);
        }
    }
    headers
}

/// Applied to every response before it reaches the client.
pub fn sanitize_response(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.remove(CONTENT_SECURITY_POLICY);
    headers.remove(CONTENT_SECURITY_POLICY_REPORT_ONLY);
    headers.remove(CLEAR_SITE_DATA);
}

/// CORS headers for the fixed 204 preflight answer.
pub fn preflight() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,PUT,PATCH,TRACE,DELETE,HEAD,OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};

    fn inbound() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("relay.example.com"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(KEEP_ALIVE, HeaderValue::from_static("timeout=5"));
        headers.insert(USER_AGENT, HeaderValue::from_static("git/2.43.0"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("token abc"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers
    }

    #[test]
    fn test_outbound_strips_connection_headers() {
        let headers = outbound(&inbound(), true);
        assert!(headers.get(HOST).is_none());
        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get(KEEP_ALIVE).is_none());
        assert_eq!(headers.get(USER_AGENT).unwrap(), "git/2.43.0");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token abc");
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "12");
    }

    #[test]
    fn test_outbound_without_body_drops_length() {
        let headers = outbound(&inbound(), false);
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_outbound_leaves_inbound_untouched() {
        let original = inbound();
        let _ = outbound(&original, false);
        assert!(original.get(HOST).is_some());
    }

    #[test]
    fn test_redirect_hop_same_origin_keeps_credentials() {
        let from = Url::parse("https://github.com/a/b/releases/download/v1/x").unwrap();
        let to = Url::parse("https://github.com/a/b/releases/download/v1/y").unwrap();
        let headers = for_redirect_hop(&outbound(&inbound(), true), &from, &to);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token abc");
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_redirect_hop_cross_origin_drops_credentials() {
        let mut previous = outbound(&inbound(), true);
        previous.insert(COOKIE, HeaderValue::from_static("session=1"));
        let from = Url::parse("https://github.com/a/b/releases/download/v1/x").unwrap();
        let to = Url::parse("https://objects.githubusercontent.com/x").unwrap();

        let headers = for_redirect_hop(&previous, &from, &to);
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(COOKIE).is_none());
        assert_eq!(headers.get(USER_AGENT).unwrap(), "git/2.43.0");
        // the previous hop's copy is untouched
        assert!(previous.get(AUTHORIZATION).is_some());
    }

    #[test]
    fn test_sanitize_response() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://github.com"));
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src 'none'"));
        headers.insert(
            CONTENT_SECURITY_POLICY_REPORT_ONLY,
            HeaderValue::from_static("default-src 'self'"),
        );
        headers.insert(CLEAR_SITE_DATA, HeaderValue::from_static("\"cache\""));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/zip"));

        sanitize_response(&mut headers);

        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(), "*");
        assert!(headers.get(CONTENT_SECURITY_POLICY).is_none());
        assert!(headers.get(CONTENT_SECURITY_POLICY_REPORT_ONLY).is_none());
        assert!(headers.get(CLEAR_SITE_DATA).is_none());
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/zip");
    }

    #[test]
    fn test_preflight_headers() {
        let headers = preflight();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap().to_str().unwrap(),
            ALLOWED_METHODS.join(",")
        );
        assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "1728000");
    }
}
