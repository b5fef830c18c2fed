//! Server accept loop
//!
//! Owns the listener and spawns a handler task per connection. The
//! coordinator and transport are created once and shared by every task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::coordinator::SessionCoordinator;
use crate::handler::handle_connection;
use crate::sweeper::spawn_sweeper;
use crate::transport::ChannelTransport;

/// Running server state shared by all connections
pub struct RoomServer {
    coordinator: Arc<SessionCoordinator>,
    transport: Arc<ChannelTransport>,
    config: Config,
}

impl RoomServer {
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(ChannelTransport::new());
        let coordinator = Arc::new(SessionCoordinator::new(&config, transport.clone()));
        Self {
            coordinator,
            transport,
            config,
        }
    }

    /// Start the eviction sweeper
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(Arc::clone(&self.coordinator), self.config.sweep_interval)
    }

    /// Accept connections forever
    pub async fn run(self, listener: TcpListener) {
        let _sweeper = self.start_sweeper();

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let coordinator = Arc::clone(&self.coordinator);
                    let transport = Arc::clone(&self.transport);

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, coordinator, transport).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
