//! Table Server Binary
//!
//! Starts the WebSocket table server with configuration drawn from the
//! environment, falling back to defaults for anything unset.

use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use table_server::network::ServerConfig;
use table_server::{TableServer, VERSION};

/// Read one config value from the environment, parsed.
fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has invalid value `{raw}`")),
    }
}

fn config_from_env() -> anyhow::Result<ServerConfig> {
    let defaults = ServerConfig::default();
    Ok(ServerConfig {
        bind_addr: env_parsed("TABLE_SERVER_ADDR", defaults.bind_addr)?,
        max_connections: env_parsed("TABLE_SERVER_MAX_CONNECTIONS", defaults.max_connections)?,
        outbound_queue: env_parsed("TABLE_SERVER_OUTBOUND_QUEUE", defaults.outbound_queue)?,
        cleanup_interval: Duration::from_secs(env_parsed(
            "TABLE_SERVER_CLEANUP_SECS",
            defaults.cleanup_interval.as_secs(),
        )?),
        abandoned_sweeps: env_parsed("TABLE_SERVER_ABANDONED_SWEEPS", defaults.abandoned_sweeps)?,
        version: VERSION.to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from_env().context("reading server configuration")?;
    info!("table server v{VERSION}");

    let server = TableServer::new(config);
    server.run().await.context("running server")?;
    Ok(())
}
