//! Redirect resolution
//!
//! The first hop is sent with redirects off. If the origin answers with a
//! `location` that is itself a recognized upstream shape, the location is
//! rewritten to point back through the relay and the response goes to the
//! client untouched otherwise. Any other location is followed server-side,
//! hop by hop, until a final response comes back or the hop limit is hit.

use crate::classify;
use crate::error::{RelayError, Result};
use crate::headers;
use crate::upstream::{ProxyTarget, RedirectMode, Upstream, UpstreamResponse};
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::{Method, StatusCode};
use tracing::{debug, info};
use url::Url;

pub struct RedirectResolver<'a> {
    upstream: &'a dyn Upstream,
    prefix: &'a str,
    max_redirects: usize,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(upstream: &'a dyn Upstream, prefix: &'a str, max_redirects: usize) -> Self {
        Self {
            upstream,
            prefix,
            max_redirects,
        }
    }

    pub async fn resolve(&self, first: ProxyTarget) -> Result<UpstreamResponse> {
        let mut target = first;
        let mut hops = 0;

        loop {
            let url = target.url.clone();
            let method = target.method.clone();
            let sent_headers = target.headers.clone();
            let mode = target.redirect;
            let sent_body = target.body.is_some();

            let mut response = self.upstream.send(target).await?;

            let Some(location) = response.headers.get(LOCATION) else {
                return Ok(response);
            };
            let location = location
                .to_str()
                .map_err(|_| RelayError::InvalidRedirectLocation)?
                .to_string();

            // A following transport resolves relative locations itself; on
            // the first hop only absolute ones are accepted.
            let auto_follow = mode == RedirectMode::Follow && is_followable(response.status);
            let next = if auto_follow {
                url.join(&location)
            } else {
                Url::parse(&location)
            }
            .map_err(|_| RelayError::InvalidRedirectLocation)?;

            if !auto_follow && classify::is_recognized(next.as_str()) {
                let relayed = format!("{}{}", self.prefix, next);
                debug!("exposing redirect {} -> {}", url, relayed);
                let value = HeaderValue::from_str(&relayed)
                    .map_err(|_| RelayError::InvalidRedirectLocation)?;
                response.headers.insert(LOCATION, value);
                return Ok(response);
            }

            hops += 1;
            if hops > self.max_redirects {
                return Err(RelayError::TooManyRedirects(self.max_redirects));
            }
            info!("following {} redirect {} -> {}", response.status, url, next);

            let mut hop_headers = headers::for_redirect_hop(&sent_headers, &url, &next);
            let method = if rewrites_to_get(response.status, &method) {
                hop_headers.remove(CONTENT_TYPE);
                Method::GET
            } else if sent_body {
                // streamed bodies are gone after the first send
                return Err(RelayError::UpstreamFailure(format!(
                    "{} redirect from {} needs the request body replayed",
                    response.status, url
                )));
            } else {
                method
            };

            target = ProxyTarget {
                headers: hop_headers,
                url: next,
                method,
                redirect: RedirectMode::Follow,
                body: None,
            };
        }
    }
}

/// A following transport turns 303 into GET, and POST into GET on 301/302.
fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::GET && *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}

/// Statuses a following transport acts on.
fn is_followable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
