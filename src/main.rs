//! GhRelay - Main entry point
//!
//! A stateless HTTP relay for GitHub resources

use anyhow::{Context, Result};
use clap::Parser;
use ghrelay::config::{DEFAULT_ASSET_URL, DEFAULT_MAX_REDIRECTS};
use ghrelay::{ProxyConfig, ProxyServer, Relay, RelayConfig};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// GhRelay - A stateless HTTP relay for GitHub resources
#[derive(Parser, Debug)]
#[command(name = "ghrelay")]
#[command(author = "GhRelay Contributors")]
#[command(version = "1.0.0")]
#[command(about = "A stateless HTTP relay for GitHub releases, raw files, git and gists")]
struct Args {
    /// HTTP port to listen on
    #[arg(long, env = "HTTP_PORT", default_value = "8080")]
    http_port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Route prefix the relay is mounted under, e.g. /gh/
    #[arg(long, env = "PREFIX", default_value = "/")]
    prefix: String,

    /// Origin for static fallback assets
    #[arg(long, env = "ASSET_URL", default_value = DEFAULT_ASSET_URL)]
    asset_url: String,

    /// Redirect blob paths to jsDelivr instead of /raw/
    #[arg(long, env = "JSDELIVR", default_value = "false")]
    jsdelivr: bool,

    /// Only relay paths containing one of these substrings (comma separated)
    #[arg(long, env = "WHITELIST", value_delimiter = ',')]
    whitelist: Vec<String>,

    /// Hop limit for following redirects server-side
    #[arg(long, env = "MAX_REDIRECTS", default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting GhRelay v1.0.0");

    let relay_config = RelayConfig {
        prefix: args.prefix,
        asset_url: args.asset_url,
        jsdelivr: args.jsdelivr,
        whitelist: args
            .whitelist
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        max_redirects: args.max_redirects,
    };
    relay_config.validate().context("Invalid relay configuration")?;

    info!("Prefix: {}", relay_config.prefix);
    info!("Asset origin: {}", relay_config.asset_url);
    info!("jsDelivr mirror: {}", relay_config.jsdelivr);
    if !relay_config.whitelist.is_empty() {
        info!("Whitelist: {:?}", relay_config.whitelist);
    }

    let relay = Arc::new(Relay::from_config(relay_config).context("Failed to build HTTP client")?);

    let config = ProxyConfig {
        bind_addr: args.bind,
        http_port: args.http_port,
    };

    let server = Arc::new(ProxyServer::new(config, relay));

    info!("GhRelay started successfully");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
