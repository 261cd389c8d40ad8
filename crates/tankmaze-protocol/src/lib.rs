//! Wire protocol for the Tank Maze relay.
//!
//! This crate defines the bytes that travel between game clients and the
//! relay:
//!
//! - **Framing** ([`FrameBuffer`], [`encode_frame`]): a little-endian
//!   `u16` length prefix around every payload.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the tagged
//!   binary layouts inside a frame.
//! - **Types** ([`MessageType`], [`RoomCode`], [`PlayerId`], [`Recipient`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! It knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (frames → messages) → Room (rules)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{FrameBuffer, LENGTH_PREFIX, MAX_PAYLOAD, encode_frame};
pub use error::ProtocolError;
pub use message::{ClientMessage, RoomInfo, ServerMessage};
pub use types::{MessageType, PlayerId, Recipient, RoomCode};
