//! Room registry and lobby rules for the Tank Maze relay.
//!
//! Rooms are plain data owned by a single [`RoomManager`]. The relay puts
//! the manager behind one lock and hands every decoded client message to
//! [`RoomManager::dispatch`], which applies the two-player rules and
//! queues replies on each player's outbound channel.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates and removes rooms, routes messages
//! - [`Room`] / [`Player`]: one lobby and its occupants
//! - [`RoomState`]: Lobby or Active
//! - [`RegistryConfig`]: optional limits

mod config;
mod error;
mod manager;
mod room;

pub use config::{RegistryConfig, RoomState};
pub use error::RoomError;
pub use manager::{CodeSource, RoomManager};
pub use room::{Departure, MAX_PLAYERS, Player, Room};
