//! GhRelay - A stateless HTTP relay in front of GitHub
//!
//! Lets clients reach release archives, raw files, git smart-HTTP endpoints,
//! gists, tags, the API and git.io links through a single domain:
//! - Path normalization and anchored shape classification
//! - Header policy for both directions (CORS, CSP stripping)
//! - Redirect resolution that keeps clients on the relay
//! - Static asset fallback for everything else

pub mod body;
pub mod classify;
pub mod config;
pub mod error;
pub mod headers;
pub mod normalize;
pub mod proxy;
pub mod relay;
pub mod resolver;
pub mod upstream;

pub use classify::{classify, Classification};
pub use config::RelayConfig;
pub use error::{ConfigError, RelayError};
pub use proxy::{ProxyConfig, ProxyServer};
pub use relay::Relay;
pub use upstream::{AssetSource, HttpAssets, HttpUpstream, ProxyTarget, RedirectMode, Upstream, UpstreamResponse};
