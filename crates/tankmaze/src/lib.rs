//! # Tank Maze relay
//!
//! A TCP relay that pairs two Tank Maze clients in a room and forwards
//! their traffic. The relay owns lobby rules (room codes, readiness,
//! host migration, round start and win detection); everything else in
//! a round is opaque bytes passed from one player to the other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tankmaze::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:9999")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod cli;
mod config;
mod error;
mod handler;
mod server;

pub use cli::Cli;
pub use config::{DEFAULT_BIND, RelayConfig};
pub use error::RelayError;
pub use server::{RelayHandle, RelayServer, RelayServerBuilder};

/// Convenience re-exports for embedding the relay.
pub mod prelude {
    pub use crate::{RelayConfig, RelayError, RelayHandle, RelayServer, RelayServerBuilder};
    pub use tankmaze_protocol::{ClientMessage, MessageType, RoomCode, ServerMessage};
    pub use tankmaze_room::{RegistryConfig, RoomState};
}
