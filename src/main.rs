//! Craftio Game Server
//!
//! Reads configuration from the environment, opens storage and serves
//! WebSocket clients until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use craftio::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Craftio Server v{}", VERSION);

    let config = ServerConfig::from_env();
    info!(
        bind = %config.bind_addr,
        tick_rate = config.tick_rate,
        max_connections = config.max_connections,
        storage = ?config.storage,
        "Configuration loaded"
    );

    let server = Arc::new(GameServer::from_config(config).context("failed to initialize server")?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("server error")?;
    Ok(())
}
