//! Bridge entry point.
//!
//! Fronts a set of facade processes, routing group collections by their
//! first path segment and rewriting URLs so clients see one origin.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use prism::bridge;
use prism::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = bridge::BridgeConfig::load().context("loading bridge configuration")?;
    tracing::info!(
        port = config.port,
        backends = config.backends.len(),
        "starting bridge"
    );

    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let state = bridge::BridgeState::new(config).context("initializing bridge state")?;
    let router = bridge::build_router(&state);

    server::serve(router, addr).await
}
