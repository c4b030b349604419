//! Error types for the relay core and its configuration

use crate::body::{full_body, RelayBody};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Errors raised while relaying a single request.
///
/// Every variant maps to exactly one status code; the rendered message is
/// the response body the client sees.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The inbound request carried no usable host.
    #[error("Missing Host header")]
    MissingHost,

    /// The inbound path could not be turned into an absolute URL.
    #[error("Invalid URL")]
    InvalidUrl,

    /// The path is not covered by the configured whitelist.
    #[error("blocked")]
    PolicyBlocked,

    /// An upstream `location` header did not parse as a URL.
    #[error("Invalid redirect location")]
    InvalidRedirectLocation,

    /// The follow chain exceeded the configured hop limit.
    #[error("too many redirects")]
    TooManyRedirects(usize),

    /// Network failure talking to the origin or the asset origin.
    #[error("upstream error:\n{0}")]
    UpstreamFailure(String),

    /// Anything else that escaped the relay.
    #[error("relay error:\n{0}")]
    Unhandled(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingHost | RelayError::InvalidUrl => StatusCode::BAD_REQUEST,
            RelayError::PolicyBlocked => StatusCode::FORBIDDEN,
            RelayError::InvalidRedirectLocation
            | RelayError::TooManyRedirects(_)
            | RelayError::UpstreamFailure(_)
            | RelayError::Unhandled(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Render the error as a plain-text response.
    pub fn into_response(self) -> Response<RelayBody> {
        let mut response = Response::new(full_body(self.to_string()));
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display omits the cause, which is usually the useful part
        let mut detail = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        RelayError::UpstreamFailure(detail)
    }
}

/// Errors in a [`crate::RelayConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("prefix must start and end with '/', got {0:?}")]
    InvalidPrefix(String),

    #[error("asset URL must be an absolute http(s) URL, got {0:?}")]
    InvalidAssetUrl(String),

    #[error("max redirects must be at least 1")]
    ZeroRedirects,
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::InvalidUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::PolicyBlocked.status(), StatusCode::FORBIDDEN);
        assert_eq!(RelayError::TooManyRedirects(10).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            RelayError::UpstreamFailure("reset".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = RelayError::PolicyBlocked.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"blocked");
    }

    #[tokio::test]
    async fn test_upstream_failure_carries_detail() {
        let response = RelayError::UpstreamFailure("connection refused".into()).into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"upstream error:\nconnection refused");
    }
}
