//! Room registry: owns every live room and routes client messages to them.

use std::collections::HashMap;

use rand::Rng;
use tankmaze_protocol::{ClientMessage, PlayerId, RoomCode, ServerMessage};
use tankmaze_session::Session;

use crate::room::{Departure, Player, Room};
use crate::{RegistryConfig, RoomError};

/// Random draws before falling back to a linear scan for a free code.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Number of distinct four-digit room codes.
const CODE_SPACE: usize = (RoomCode::MAX - RoomCode::MIN + 1) as usize;

/// Produces candidate room numbers. Values outside the four-digit range
/// are treated as collisions.
pub type CodeSource = Box<dyn FnMut() -> u16 + Send>;

fn random_code() -> u16 {
    rand::rng().random_range(RoomCode::MIN..=RoomCode::MAX)
}

/// Holds every live room, keyed by code.
///
/// The relay keeps exactly one of these behind a lock. Each method is a
/// complete transition, so holding the lock for one call is enough to
/// keep the rules consistent across connections.
pub struct RoomManager {
    rooms: HashMap<RoomCode, Room>,
    config: RegistryConfig,
    next_code: CodeSource,
}

impl RoomManager {
    /// Creates an empty registry drawing random codes.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_code_source(config, Box::new(random_code))
    }

    /// Creates an empty registry with a custom code generator.
    pub fn with_code_source(config: RegistryConfig, next_code: CodeSource) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            next_code,
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn lookup(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -- Dispatch -----------------------------------------------------------

    /// Applies one decoded client message on behalf of `session`.
    ///
    /// Errors that carry a wire text are answered with a `RoomError`
    /// reply before being returned; the rest are silent no-ops and are
    /// returned only so the caller can log them. `Disconnect` is left to
    /// the caller, which owns the connection.
    pub fn dispatch(
        &mut self,
        session: &mut Session,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        let result = match msg {
            ClientMessage::Connect => {
                session.send(ServerMessage::ConnectAck);
                Ok(())
            }
            ClientMessage::Disconnect => Ok(()),
            ClientMessage::CreateRoom {
                maze_width,
                maze_height,
                dark_mode,
            } => self
                .create_room(session, maze_width, maze_height, dark_mode)
                .map(|_| ()),
            ClientMessage::JoinRoom { code } => self.join_room(session, code),
            ClientMessage::MazeData { escape_mode, raw } => {
                self.upload_maze(session, escape_mode, raw)
            }
            ClientMessage::PlayerReady { ready, raw } => self.set_ready(session, ready, raw),
            ClientMessage::HostStartGame => self.start_game(session),
            ClientMessage::ReachExit { raw } => self.reach_exit(session, raw).map(|_| ()),
            ClientMessage::GameResult { raw } => self.game_result(session, raw),
            ClientMessage::RestartRequest { raw } => self.restart(session, raw),
            ClientMessage::Gameplay { raw, .. } => self.relay_gameplay(session, raw),
        };

        if let Err(err) = &result {
            if let Some(text) = err.wire_message() {
                session.send(ServerMessage::RoomError {
                    message: text.to_owned(),
                });
            }
        }
        result
    }

    // -- Operations ---------------------------------------------------------

    /// Opens a new room with the session as host.
    ///
    /// The host receives `RoomCreated` followed by the first room info.
    pub fn create_room(
        &mut self,
        session: &mut Session,
        maze_width: u16,
        maze_height: u16,
        dark_mode: bool,
    ) -> Result<RoomCode, RoomError> {
        session.can_enter_room()?;
        let code = self.allocate_code()?;

        let host = Player::from_session(session, true);
        let room = Room::new(code.clone(), maze_width, maze_height, dark_mode, host);
        session.enter_room(code.clone())?;
        session.send(ServerMessage::RoomCreated { code: code.clone() });
        room.broadcast_info();
        self.rooms.insert(code.clone(), room);

        tracing::info!(
            room = %code,
            player_id = %session.player_id(),
            maze_width,
            maze_height,
            dark_mode,
            "room created"
        );
        Ok(code)
    }

    /// Seats the session as guest in the room with `code`.
    pub fn join_room(&mut self, session: &mut Session, code: RoomCode) -> Result<(), RoomError> {
        session.can_enter_room()?;
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.add_guest(Player::from_session(session, false))?;
        session.enter_room(code.clone())?;

        tracing::info!(room = %code, player_id = %session.player_id(), "player joined");
        Ok(())
    }

    /// Stores the host's maze upload.
    pub fn upload_maze(
        &mut self,
        session: &Session,
        escape_mode: Option<bool>,
        raw: Vec<u8>,
    ) -> Result<(), RoomError> {
        let len = raw.len();
        let room = self.room_of(session)?;
        room.set_maze(session.player_id(), escape_mode, raw)?;
        tracing::debug!(room = %room.code(), len, escape = room.is_escape_mode(), "maze stored");
        Ok(())
    }

    pub fn set_ready(&mut self, session: &Session, ready: bool, raw: Vec<u8>) -> Result<(), RoomError> {
        self.room_of(session)?.set_ready(session.player_id(), ready, raw)
    }

    /// Starts a round on the host's request.
    pub fn start_game(&mut self, session: &Session) -> Result<(), RoomError> {
        let room = self.room_of(session)?;
        room.start(session.player_id())?;
        tracing::info!(room = %room.code(), "round started");
        Ok(())
    }

    /// Forwards in-round telemetry to the other occupant.
    pub fn relay_gameplay(&mut self, session: &Session, raw: Vec<u8>) -> Result<(), RoomError> {
        self.room_of(session)?.relay(session.player_id(), raw)
    }

    /// Records an exit arrival. Returns `true` if it completed the round.
    pub fn reach_exit(&mut self, session: &Session, raw: Vec<u8>) -> Result<bool, RoomError> {
        let room = self.room_of(session)?;
        let won = room.reach_exit(session.player_id(), raw)?;
        if won {
            tracing::info!(room = %room.code(), "round won");
        }
        Ok(won)
    }

    pub fn game_result(&mut self, session: &Session, raw: Vec<u8>) -> Result<(), RoomError> {
        let room = self.room_of(session)?;
        room.relay(session.player_id(), raw)?;
        tracing::debug!(room = %room.code(), player_id = %session.player_id(), "result relayed");
        Ok(())
    }

    /// Returns the session's room to the lobby.
    pub fn restart(&mut self, session: &Session, raw: Vec<u8>) -> Result<(), RoomError> {
        let room = self.room_of(session)?;
        room.restart(session.player_id(), raw)?;
        tracing::info!(room = %room.code(), player_id = %session.player_id(), "room restarted");
        Ok(())
    }

    /// Runs departure cleanup for a session.
    ///
    /// Closes the session and removes it from its room, deleting the room
    /// once empty. Safe to call any number of times: only the first call
    /// for a session does anything.
    pub fn leave(&mut self, session: &mut Session) -> Departure {
        let player_id = session.player_id();
        let Some(code) = session.close() else {
            return Departure::Absent;
        };
        self.depart(&code, player_id)
    }

    fn depart(&mut self, code: &RoomCode, player_id: PlayerId) -> Departure {
        let Some(room) = self.rooms.get_mut(code) else {
            return Departure::Absent;
        };
        let outcome = room.depart(player_id);
        match outcome {
            Departure::Emptied => {
                self.rooms.remove(code);
                tracing::info!(room = %code, %player_id, "last player left, room removed");
            }
            Departure::Remaining { host_migrated } => {
                tracing::info!(room = %code, %player_id, host_migrated, "player left");
            }
            Departure::Absent => {}
        }
        outcome
    }

    // -- Helpers ------------------------------------------------------------

    fn room_of(&mut self, session: &Session) -> Result<&mut Room, RoomError> {
        let code = session.room().ok_or(RoomError::NotInRoom)?;
        self.rooms.get_mut(code).ok_or(RoomError::NotInRoom)
    }

    /// Picks a code no live room holds.
    fn allocate_code(&mut self) -> Result<RoomCode, RoomError> {
        let limit = self.config.max_rooms.map_or(CODE_SPACE, |max| max.min(CODE_SPACE));
        if self.rooms.len() >= limit {
            return Err(RoomError::CapacityReached);
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            if let Some(code) = RoomCode::from_number((self.next_code)()) {
                if !self.rooms.contains_key(&code) {
                    return Ok(code);
                }
            }
        }
        (RoomCode::MIN..=RoomCode::MAX)
            .filter_map(RoomCode::from_number)
            .find(|code| !self.rooms.contains_key(code))
            .ok_or(RoomError::CapacityReached)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for RoomManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomManager")
            .field("rooms", &self.rooms.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    fn session(id: u64) -> (Session, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Session::new(PlayerId(id), format!("10.0.0.{id}"), tx), rx)
    }

    fn fixed(codes: Vec<u16>) -> CodeSource {
        let mut iter = codes.into_iter().cycle();
        Box::new(move || iter.next().unwrap_or(0))
    }

    #[test]
    fn test_allocate_code_retries_on_collision() {
        let mut mgr = RoomManager::with_code_source(RegistryConfig::default(), fixed(vec![1111, 1111, 2222]));
        let (mut a, _ra) = session(1);
        let (mut b, _rb) = session(2);
        assert_eq!(mgr.create_room(&mut a, 1, 1, false).unwrap().as_str(), "1111");
        assert_eq!(mgr.create_room(&mut b, 1, 1, false).unwrap().as_str(), "2222");
    }

    #[test]
    fn test_allocate_code_falls_back_to_scan() {
        let mut mgr = RoomManager::with_code_source(RegistryConfig::default(), fixed(vec![5000]));
        let (mut a, _ra) = session(1);
        let (mut b, _rb) = session(2);
        mgr.create_room(&mut a, 1, 1, false).unwrap();
        assert_eq!(mgr.create_room(&mut b, 1, 1, false).unwrap().as_str(), "1000");
    }

    #[test]
    fn test_allocate_code_ignores_out_of_range_values() {
        let calls = Arc::new(AtomicU16::new(0));
        let counter = Arc::clone(&calls);
        let source: CodeSource = Box::new(move || {
            if counter.fetch_add(1, Ordering::Relaxed) == 0 { 42 } else { 7777 }
        });
        let mut mgr = RoomManager::with_code_source(RegistryConfig::default(), source);
        let (mut a, _ra) = session(1);
        assert_eq!(mgr.create_room(&mut a, 1, 1, false).unwrap().as_str(), "7777");
    }

    #[test]
    fn test_max_rooms_reached_rejects_create() {
        let config = RegistryConfig { max_rooms: Some(1) };
        let mut mgr = RoomManager::new(config);
        let (mut a, _ra) = session(1);
        let (mut b, mut rb) = session(2);
        mgr.create_room(&mut a, 1, 1, false).unwrap();

        assert!(matches!(
            mgr.create_room(&mut b, 1, 1, false),
            Err(RoomError::CapacityReached)
        ));
        assert!(b.room().is_none());
        assert!(rb.try_recv().is_err());
        assert_eq!(mgr.room_count(), 1);
    }

    #[test]
    fn test_create_while_in_room_leaves_registry_unchanged() {
        let mut mgr = RoomManager::default();
        let (mut a, _ra) = session(1);
        let first = mgr.create_room(&mut a, 1, 1, false).unwrap();

        assert!(matches!(
            mgr.create_room(&mut a, 1, 1, false),
            Err(RoomError::Session(_))
        ));
        assert_eq!(mgr.room_codes(), vec![first]);
    }

    #[test]
    fn test_room_of_without_room_is_not_in_room() {
        let mut mgr = RoomManager::default();
        let (a, _ra) = session(1);
        assert!(matches!(mgr.start_game(&a), Err(RoomError::NotInRoom)));
    }

    #[test]
    fn test_leave_idle_session_is_absent() {
        let mut mgr = RoomManager::default();
        let (mut a, _ra) = session(1);
        assert_eq!(mgr.leave(&mut a), Departure::Absent);
        assert!(a.is_closed());
    }
}
