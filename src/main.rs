//! Room Share Server - Entry Point
//!
//! Loads configuration, starts the TCP listener and serves connections.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use share_room_server::{Config, RoomServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=share_room_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("share_room_server=info")),
        )
        .init();

    // Bind address from command line, tuning from environment
    let config = Config::from_env()?;

    // Start TCP listener
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Room share server listening on {} (grace {:?}, sweep every {:?})",
        config.bind_addr, config.grace_period, config.sweep_interval
    );

    RoomServer::new(config).run(listener).await;
    Ok(())
}
