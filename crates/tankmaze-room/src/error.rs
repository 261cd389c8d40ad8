//! Error types for the room layer.

use tankmaze_protocol::RoomCode;
use tankmaze_session::SessionError;

/// Errors that can occur during room operations.
///
/// Only [`NotFound`](Self::NotFound) and [`RoomFull`](Self::RoomFull) are
/// ever shown to a client (see [`wire_message`](Self::wire_message)).
/// Everything else is an ordinary no-op: logged, never answered, and
/// never a reason to drop the connection.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room already holds two players.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The sender is not in any room.
    #[error("player is not in a room")]
    NotInRoom,

    /// A host-only action from the guest.
    #[error("only the host may do this")]
    NotHost,

    /// A gameplay message while the room is in the lobby.
    #[error("no round is running")]
    NotStarted,

    /// A start request while a round is already running.
    #[error("round already running")]
    AlreadyStarted,

    /// A start request without a ready second player.
    #[error("guest is missing or not ready")]
    NotReady,

    /// The room limit or the code space is exhausted.
    #[error("no room codes available")]
    CapacityReached,

    /// The session cannot enter a room.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RoomError {
    /// The text sent in a `RoomError` reply, for errors the requester
    /// is told about.
    pub fn wire_message(&self) -> Option<&'static str> {
        match self {
            Self::NotFound(_) => Some("Room not found"),
            Self::RoomFull(_) => Some("Room is full"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_message_only_for_lookup_failures() {
        let code = RoomCode::from_number(1234).unwrap();
        assert_eq!(
            RoomError::NotFound(code.clone()).wire_message(),
            Some("Room not found")
        );
        assert_eq!(RoomError::RoomFull(code).wire_message(), Some("Room is full"));
        assert_eq!(RoomError::NotHost.wire_message(), None);
        assert_eq!(RoomError::NotReady.wire_message(), None);
        assert_eq!(RoomError::Session(SessionError::Closed).wire_message(), None);
    }

    #[test]
    fn test_display_includes_code() {
        let code = RoomCode::from_number(4321).unwrap();
        assert_eq!(RoomError::NotFound(code).to_string(), "room 4321 not found");
    }
}
