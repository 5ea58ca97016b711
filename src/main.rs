//! Facade entry point.
//!
//! One process serves one ecosystem, selected by `XREGISTRY_ECOSYSTEM`
//! (default npm). Exit code is 0 on signal-driven shutdown and non-zero
//! on bind failure or unrecoverable init errors; restart supervision is
//! external.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use prism::config::FacadeConfig;
use prism::server;
use prism::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FacadeConfig::load().context("loading configuration")?;

    let default_filter = if config.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!(
        ecosystem = config.ecosystem.service_name(),
        port = config.port,
        cache_dir = %config.cache_dir.display(),
        "starting facade"
    );

    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let state = AppState::new(config).await.context("initializing facade state")?;
    let router = server::build_router(&state);

    server::serve(router, addr).await
}
