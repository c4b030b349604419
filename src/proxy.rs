//! Proxy server implementation
//! Accepts HTTP connections and hands every request to the relay

use crate::body::{full_body, BoxError, RelayBody};
use crate::error::RelayError;
use crate::headers;
use crate::relay::Relay;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures_util::FutureExt;
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::any::Any;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Proxy server configuration
#[derive(Clone)]
pub struct ProxyConfig {
    pub bind_addr: IpAddr,
    pub http_port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 8080,
        }
    }
}

/// Proxy server
pub struct ProxyServer {
    config: ProxyConfig,
    relay: Arc<Relay>,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ProxyConfig, relay: Arc<Relay>) -> Self {
        Self { config, relay }
    }

    /// Start the proxy server
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = SocketAddr::new(self.config.bind_addr, self.config.http_port);
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on {}", addr);

        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let relay = self.relay.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, remote_addr, relay).await {
                    debug!("HTTP connection error from {}: {}", remote_addr, e);
                }
            });
        }
    }

    /// Handle a single HTTP connection
    async fn handle_connection(
        stream: TcpStream,
        remote_addr: SocketAddr,
        relay: Arc<Relay>,
    ) -> Result<()> {
        let io = TokioIo::new(stream);

        http1::Builder::new()
            .preserve_header_case(true)
            .title_case_headers(false)
            .serve_connection(
                io,
                service_fn(move |req| {
                    let relay = relay.clone();
                    async move { Self::handle_request(req, remote_addr, relay).await }
                }),
            )
            .await
            .map_err(|e| anyhow!("HTTP service error: {}", e))
    }

    /// Handle incoming request. Dropping this future (client went away)
    /// drops the in-flight upstream request with it.
    async fn handle_request(
        req: Request<Incoming>,
        remote_addr: SocketAddr,
        relay: Arc<Relay>,
    ) -> Result<Response<RelayBody>, Infallible> {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            uri = %req.uri()
        );

        let response = async move {
            debug!("from {}", remote_addr);
            Self::respond(&relay, req).await
        }
        .instrument(span)
        .await;

        Ok(response)
    }

    /// Answer one request. A panic inside the relay becomes a 502.
    async fn respond<B>(relay: &Relay, req: Request<B>) -> Response<RelayBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        if req.uri().path() == "/health" {
            let mut response = Self::text_response(StatusCode::OK, "OK");
            headers::sanitize_response(response.headers_mut());
            return response;
        }

        AssertUnwindSafe(relay.handle(req))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let detail = panic_message(panic.as_ref());
                error!("relay panicked: {}", detail);
                let mut response = RelayError::Unhandled(detail).into_response();
                headers::sanitize_response(response.headers_mut());
                response
            })
    }

    /// Create text response
    fn text_response(status: StatusCode, body: &'static str) -> Response<RelayBody> {
        let mut response = Response::new(full_body(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
