//! `RelayServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room.

use std::sync::Arc;

use tankmaze_protocol::RoomCode;
use tankmaze_room::RoomManager;
use tankmaze_transport::{TcpTransport, Transport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{RelayConfig, RelayError};

/// Shared state passed to each connection handler task.
///
/// One lock around the whole registry serializes every room transition
/// across connections.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) config: RelayConfig,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// use tankmaze::prelude::*;
///
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:9999")
///     .build()
///     .await?;
/// server.run().await
/// ```
#[derive(Debug, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Binds the listener and sets up an empty room registry.
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        let transport = TcpTransport::bind(&self.config.bind).await?;
        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.config.registry())),
            config: self.config,
        });
        Ok(RelayServer { transport, state })
    }
}

/// A bound relay. Call [`run()`](Self::run) to start accepting players.
pub struct RelayServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl RelayServer {
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.state.config
    }

    /// Returns a handle for inspecting the room registry while the
    /// server runs.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), RelayError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "relay accepting connections");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Read-only view of a running relay's rooms.
#[derive(Clone)]
pub struct RelayHandle {
    state: Arc<ServerState>,
}

impl RelayHandle {
    pub async fn room_count(&self) -> usize {
        self.state.rooms.lock().await.room_count()
    }

    pub async fn room_codes(&self) -> Vec<RoomCode> {
        self.state.rooms.lock().await.room_codes()
    }
}
