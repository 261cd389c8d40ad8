//! Player sessions for the Tank Maze relay.
//!
//! A [`Session`] is the connection handler's record of one connected
//! player: who it is, where it connected from, which room it sits in,
//! and the channel that delivers outbound messages to its socket.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← reads and updates the session during each message
//!     ↕
//! Session Layer (this crate)  ← owned by the connection handler
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId, RoomCode, ServerMessage
//! ```

mod error;
mod session;

pub use error::SessionError;
pub use session::{PlayerSender, Session, SessionState};
