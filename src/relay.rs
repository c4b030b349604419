//! Relay engine
//!
//! `Relay::handle` is the whole request contract: one inbound request in,
//! one response out, with no state carried between requests.

use crate::body::{self, empty_body, BoxError, RelayBody};
use crate::classify::{self, Classification};
use crate::config::{RelayConfig, JSDELIVR_GH};
use crate::error::{RelayError, Result};
use crate::headers;
use crate::normalize;
use crate::resolver::RedirectResolver;
use crate::upstream::{AssetSource, HttpAssets, HttpUpstream, ProxyTarget, RedirectMode, Upstream};
use bytes::Bytes;
use hyper::body::Body;
use hyper::header::{HeaderValue, ACCESS_CONTROL_REQUEST_HEADERS, HOST, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::{Position, Url};

static GITHUB_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:https?://)?github\.com").expect("valid host regex"));

/// Where a blob path should go instead of being relayed.
enum BlobRoute {
    Redirect(String),
    Relay,
}

pub struct Relay {
    config: Arc<RelayConfig>,
    upstream: Arc<dyn Upstream>,
    assets: Arc<dyn AssetSource>,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        upstream: Arc<dyn Upstream>,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
            assets,
        }
    }

    /// Relay wired to the real origin and asset origin over HTTP.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::new()?);
        let assets = Arc::new(HttpAssets::new(config.asset_url.clone())?);
        Ok(Self::new(config, upstream, assets))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle one inbound request. Errors are rendered as responses; every
    /// response leaves with the CORS and security header policy applied.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<RelayBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut response = match self.dispatch(req).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    RelayError::PolicyBlocked => warn!("blocked by whitelist"),
                    RelayError::UpstreamFailure(detail) => warn!("upstream failure: {}", detail),
                    other => debug!("relay error: {}", other),
                }
                e.into_response()
            }
        };
        headers::sanitize_response(response.headers_mut());
        response
    }

    async fn dispatch<B>(&self, req: Request<B>) -> Result<Response<RelayBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let url = inbound_url(&req)?;
        debug!("in: {}", url);

        if let Some(q) = normalize::redirect_shorthand(&url) {
            let host = &url[Position::BeforeHost..Position::AfterPort];
            let location = format!("https://{}{}{}", host, self.config.prefix, q);
            return redirect(StatusCode::MOVED_PERMANENTLY, &location);
        }

        let path = normalize::normalize(&url, &self.config.prefix);
        let class = classify::classify(&path);
        debug!("path: {} ({})", path, class);

        match class {
            Classification::BlobOrRaw => match self.blob_route(&path) {
                BlobRoute::Redirect(location) => {
                    info!("redirecting blob to {}", location);
                    redirect(StatusCode::FOUND, &location)
                }
                BlobRoute::Relay => self.relay(req, path).await,
            },
            Classification::Unmatched => {
                let response = self.assets.fetch(&path).await?;
                Ok(response.into_response())
            }
            _ => self.relay(req, path).await,
        }
    }

    fn blob_route(&self, path: &str) -> BlobRoute {
        if self.config.jsdelivr {
            let segment = if path.contains("/blob/") { "/blob/" } else { "/raw/" };
            let mirrored = path.replacen(segment, "@", 1);
            let location = GITHUB_HOST.replace(&mirrored, JSDELIVR_GH).into_owned();
            return BlobRoute::Redirect(location);
        }

        // already in raw form: redirecting again would loop
        if !path.contains("/blob/") {
            return BlobRoute::Relay;
        }
        BlobRoute::Redirect(format!(
            "{}{}",
            self.config.prefix,
            path.replacen("/blob/", "/raw/", 1)
        ))
    }

    /// Forward a directly relayable path to its origin.
    async fn relay<B>(&self, req: Request<B>, path: String) -> Result<Response<RelayBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        if req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_HEADERS) {
            let mut response = Response::new(empty_body());
            *response.status_mut() = StatusCode::NO_CONTENT;
            *response.headers_mut() = headers::preflight();
            return Ok(response);
        }

        if !self.config.permits(&path) {
            return Err(RelayError::PolicyBlocked);
        }

        let target = if !normalize::has_scheme(&path) && path.starts_with("git") {
            format!("https://{}", path)
        } else {
            path
        };
        let url = Url::parse(&target).map_err(|_| RelayError::InvalidUrl)?;
        info!("relaying {} {}", req.method(), url);

        let (parts, inbound) = req.into_parts();
        let body = (!inbound.is_end_stream()).then(|| body::boxed(inbound));
        let target = ProxyTarget {
            url,
            method: parts.method,
            headers: headers::outbound(&parts.headers, body.is_some()),
            redirect: RedirectMode::Manual,
            body,
        };

        let resolver = RedirectResolver::new(
            self.upstream.as_ref(),
            &self.config.prefix,
            self.config.max_redirects,
        );
        let response = resolver.resolve(target).await?;
        Ok(response.into_response())
    }
}

/// Rebuild the absolute URL the client asked for. Origin-form requests get
/// their scheme from forwarding headers and their authority from `Host`.
pub fn inbound_url<B>(req: &Request<B>) -> Result<Url> {
    let uri = req.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|_| RelayError::InvalidUrl);
    }

    let host = req
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .ok_or(RelayError::MissingHost)?;
    let scheme = if is_https_request(req) { "https" } else { "http" };
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Url::parse(&format!("{}://{}{}", scheme, host, path_and_query)).map_err(|_| RelayError::InvalidUrl)
}

/// Check if request is from HTTPS (via proxy headers)
fn is_https_request<B>(req: &Request<B>) -> bool {
    let header_is = |name: &str, expected: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    };
    header_is("x-forwarded-proto", "https")
        || header_is("x-forwarded-ssl", "on")
        || header_is("front-end-https", "on")
}

fn redirect(status: StatusCode, location: &str) -> Result<Response<RelayBody>> {
    let value = HeaderValue::from_str(location).map_err(|_| RelayError::InvalidUrl)?;
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response.headers_mut().insert(LOCATION, value);
    Ok(response)
}
