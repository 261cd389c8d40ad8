//! Session types: the per-connection record a handler carries around.
//!
//! The relay never hangs state off the socket itself. Everything the room
//! rules need to know about "the player on this connection" lives here,
//! and the handler passes it by reference into every room operation.

use tankmaze_protocol::{PlayerId, RoomCode, ServerMessage};
use tokio::sync::mpsc;

use crate::SessionError;

/// Channel sender for delivering outbound messages to a player's socket.
///
/// Unbounded: a slow peer grows its own queue instead of stalling the
/// task that produced the message.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Idle ──(create/join)──→ InRoom ──(close)──→ Closed
///     │                                           ↑
///     └──────────────────(close)──────────────────┘
/// ```
///
/// `Closed` is terminal. Reaching it is what makes cleanup idempotent:
/// only the first [`Session::close`] call reports a room to leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not in any room yet.
    Idle,
    /// Occupying the room with this code.
    InRoom(RoomCode),
    /// Cleanup has run; the session will not touch any room again.
    Closed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connected player.
#[derive(Debug)]
pub struct Session {
    player_id: PlayerId,
    /// Origin label shown to the other occupant in room info.
    origin: String,
    sender: PlayerSender,
    state: SessionState,
}

impl Session {
    /// Creates an idle session.
    pub fn new(player_id: PlayerId, origin: impl Into<String>, sender: PlayerSender) -> Self {
        Self {
            player_id,
            origin: origin.into(),
            sender,
            state: SessionState::Idle,
        }
    }

    /// Returns the player's ID.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Returns the connection-origin label.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the outbound channel for this player.
    pub fn sender(&self) -> &PlayerSender {
        &self.sender
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the code of the room this session occupies, if any.
    pub fn room(&self) -> Option<&RoomCode> {
        match &self.state {
            SessionState::InRoom(code) => Some(code),
            _ => None,
        }
    }

    /// Checks whether the session may enter a room, without changing it.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyInRoom`] if the session is in a room
    /// - [`SessionError::Closed`] after cleanup
    pub fn can_enter_room(&self) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Idle => Ok(()),
            SessionState::InRoom(current) => {
                Err(SessionError::AlreadyInRoom(current.clone()))
            }
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    /// Records that the player now occupies `code`.
    ///
    /// # Errors
    /// Same as [`can_enter_room`](Self::can_enter_room).
    pub fn enter_room(&mut self, code: RoomCode) -> Result<(), SessionError> {
        self.can_enter_room()?;
        self.state = SessionState::InRoom(code);
        Ok(())
    }

    /// Marks the session closed and returns the room it must leave.
    ///
    /// Returns `Some(code)` only on the first call for a session that was
    /// in a room; every later call returns `None`.
    pub fn close(&mut self) -> Option<RoomCode> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::InRoom(code) => Some(code),
            SessionState::Idle | SessionState::Closed => None,
        }
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Queues a message for this player. A send to a connection whose
    /// writer is already gone is dropped.
    pub fn send(&self, msg: ServerMessage) {
        if self.sender.send(msg).is_err() {
            tracing::debug!(player_id = %self.player_id, "outbound channel closed, dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(PlayerId(1), "10.0.0.1", tx), rx)
    }

    fn code(n: u16) -> RoomCode {
        RoomCode::from_number(n).unwrap()
    }

    #[test]
    fn test_new_session_is_idle() {
        let (s, _rx) = session();
        assert_eq!(s.state(), &SessionState::Idle);
        assert!(s.room().is_none());
        assert_eq!(s.origin(), "10.0.0.1");
        assert_eq!(s.player_id(), PlayerId(1));
    }

    #[test]
    fn test_enter_room_from_idle_succeeds() {
        let (mut s, _rx) = session();
        s.enter_room(code(1234)).unwrap();
        assert_eq!(s.room(), Some(&code(1234)));
    }

    #[test]
    fn test_enter_room_twice_rejected() {
        let (mut s, _rx) = session();
        s.enter_room(code(1234)).unwrap();
        let err = s.enter_room(code(5678)).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyInRoom(c) if c == code(1234)));
        // The first room is kept.
        assert_eq!(s.room(), Some(&code(1234)));
    }

    #[test]
    fn test_can_enter_room_does_not_mutate() {
        let (s, _rx) = session();
        s.can_enter_room().unwrap();
        assert_eq!(s.state(), &SessionState::Idle);
    }

    #[test]
    fn test_close_returns_room_exactly_once() {
        let (mut s, _rx) = session();
        s.enter_room(code(4321)).unwrap();

        assert_eq!(s.close(), Some(code(4321)));
        assert!(s.is_closed());
        assert_eq!(s.close(), None);
        assert_eq!(s.close(), None);
    }

    #[test]
    fn test_close_idle_session_returns_none() {
        let (mut s, _rx) = session();
        assert_eq!(s.close(), None);
        assert!(s.is_closed());
    }

    #[test]
    fn test_enter_room_after_close_rejected() {
        let (mut s, _rx) = session();
        s.close();
        assert!(matches!(s.enter_room(code(1000)), Err(SessionError::Closed)));
    }

    #[test]
    fn test_send_delivers_to_receiver() {
        let (s, mut rx) = session();
        s.send(ServerMessage::GameStart);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::GameStart);
    }

    #[test]
    fn test_send_after_receiver_dropped_does_not_panic() {
        let (s, rx) = session();
        drop(rx);
        s.send(ServerMessage::GameWin);
    }
}
