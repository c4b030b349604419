//! Relay configuration
//!
//! Built once at startup and shared read-only by every request.

use crate::error::ConfigError;
use url::Url;

/// Static fallback assets (index page, 404, service worker)
pub const DEFAULT_ASSET_URL: &str = "https://crazypeace.github.io/gh-proxy/";

/// jsDelivr's GitHub mirror, used for blob paths when the mirror toggle is on
pub const JSDELIVR_GH: &str = "https://cdn.jsdelivr.net/gh";

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Route prefix the relay is mounted under, e.g. `/` or `/gh/`.
    pub prefix: String,
    /// Origin for paths that match no upstream shape.
    pub asset_url: String,
    /// Redirect blob paths to jsDelivr instead of `/raw/`.
    pub jsdelivr: bool,
    /// Substrings a relayed path must contain. Empty means no restriction.
    pub whitelist: Vec<String>,
    /// Hop limit for server-side redirect following.
    pub max_redirects: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            asset_url: DEFAULT_ASSET_URL.to_string(),
            jsdelivr: false,
            whitelist: Vec::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.prefix.starts_with('/') || !self.prefix.ends_with('/') {
            return Err(ConfigError::InvalidPrefix(self.prefix.clone()));
        }

        match Url::parse(&self.asset_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidAssetUrl(self.asset_url.clone())),
        }

        if self.max_redirects == 0 {
            return Err(ConfigError::ZeroRedirects);
        }

        Ok(())
    }

    /// Whitelist check: an empty list lets everything through.
    pub fn permits(&self, path: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|item| path.contains(item.as_str()))
    }
}
