//! Outbound side of the relay: the origin and the static asset origin

use crate::body::{self, RelayBody};
use crate::error::Result;
use async_trait::async_trait;
use hyper::header::HeaderMap;
use hyper::{Method, Response, StatusCode};
use tracing::debug;
use url::Url;

/// How the resolver treats a `location` on the response to this hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// First hop: inspect the location and decide whether to expose it.
    Manual,
    /// Follow hops: behave like a transport that follows redirects.
    Follow,
}

/// One outbound request. Built fresh for every hop.
pub struct ProxyTarget {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub redirect: RedirectMode,
    pub body: Option<RelayBody>,
}

/// What came back from an upstream, body still streaming.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: RelayBody,
}

impl UpstreamResponse {
    pub fn into_response(self) -> Response<RelayBody> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Sends a single request to the origin. Implementations must never follow
/// redirects on their own.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, target: ProxyTarget) -> Result<UpstreamResponse>;
}

/// Fetches static fallback assets by path.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<UpstreamResponse>;
}

/// reqwest-backed origin client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, target: ProxyTarget) -> Result<UpstreamResponse> {
        debug!("{} {} ({:?})", target.method, target.url, target.redirect);

        let mut request = self
            .client
            .request(target.method, target.url)
            .headers(target.headers);
        if let Some(body) = target.body {
            request = request.body(body::into_reqwest(body));
        }

        let response = request.send().await?;
        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: body::from_reqwest(response),
        })
    }
}

/// reqwest-backed asset origin. Plain GET of `base_url + path`, redirects
/// followed by the client.
#[derive(Clone)]
pub struct HttpAssets {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssets {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn asset_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AssetSource for HttpAssets {
    async fn fetch(&self, path: &str) -> Result<UpstreamResponse> {
        let url = self.asset_url(path);
        debug!("fetch asset {}", url);

        let response = self.client.get(&url).send().await?;
        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: body::from_reqwest(response),
        })
    }
}
