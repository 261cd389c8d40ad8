//! Error types for the session layer.

use tankmaze_protocol::RoomCode;

/// Errors that can occur while moving a session between rooms.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session already occupies a room. A player belongs to at most
    /// one room for the lifetime of its connection slot.
    #[error("already in room {0}")]
    AlreadyInRoom(RoomCode),

    /// The connection has been cleaned up and can no longer join rooms.
    #[error("session is closed")]
    Closed,
}
