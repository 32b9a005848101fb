//! shellcache server entry point.
//!
//! Loads configuration, opens the cache, deploys the configured version and
//! boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchConfig, HttpNetwork};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod context;
mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version_tag, origin = %config.origin, "starting shellcache server on stdio transport");

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let ctx = context::ProxyContext::new(config, store, network);

    match ctx.deploy_configured().await {
        Ok(report) => tracing::info!(version = %report.version, precached = report.precached, "initial deploy complete"),
        Err(e) => tracing::error!(error = %e, "initial deploy failed, requests pass through until a deploy succeeds"),
    }

    let handler = handler::ShellCacheServer::new(Arc::new(ctx));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
