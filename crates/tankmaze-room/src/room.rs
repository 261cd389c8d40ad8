//! A single room and the rules that govern it.
//!
//! A room holds at most two players in join order. The first is the host
//! (it created the room, or inherited the role when the creator left);
//! the other is the guest. Every method here runs to completion under the
//! registry lock, so a multi-step update such as "toggle readiness, relay
//! it, then broadcast room info" is observed atomically by both players.

use tankmaze_protocol::{PlayerId, Recipient, RoomCode, RoomInfo, ServerMessage};
use tankmaze_session::{PlayerSender, Session};

use crate::{RoomError, RoomState};

/// A room never holds more than this many players.
pub const MAX_PLAYERS: usize = 2;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One occupant of a room. Owned by its room; it does not exist outside it.
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    origin: String,
    sender: PlayerSender,
    is_host: bool,
    ready: bool,
    reached_exit: bool,
}

impl Player {
    /// Builds the room entry for a session. Hosts start ready; guests
    /// must ready up themselves.
    pub(crate) fn from_session(session: &Session, is_host: bool) -> Self {
        Self {
            id: session.player_id(),
            origin: session.origin().to_owned(),
            sender: session.sender().clone(),
            is_host,
            ready: is_host,
            reached_exit: false,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn reached_exit(&self) -> bool {
        self.reached_exit
    }

    /// Queues a message; a closed channel means the player is mid-cleanup
    /// and the message is dropped.
    fn send(&self, msg: ServerMessage) {
        if self.sender.send(msg).is_err() {
            tracing::debug!(player_id = %self.id, "peer channel closed, dropping message");
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Outcome of a player leaving a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The player was not in this room.
    Absent,
    /// The room has no players left and must be removed.
    Emptied,
    /// Players remain. `host_migrated` is set when the leaver was host.
    Remaining { host_migrated: bool },
}

/// A two-player lobby and the round running in it.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    maze_width: u16,
    maze_height: u16,
    maze_data: Option<Vec<u8>>,
    players: Vec<Player>,
    state: RoomState,
    escape_mode: bool,
    dark_mode: bool,
    /// Set once `GameWin` has gone out this round.
    win_announced: bool,
}

impl Room {
    /// Opens a room in the lobby with `host` as its only player.
    pub(crate) fn new(
        code: RoomCode,
        maze_width: u16,
        maze_height: u16,
        dark_mode: bool,
        host: Player,
    ) -> Self {
        Self {
            code,
            maze_width,
            maze_height,
            maze_data: None,
            players: vec![host],
            state: RoomState::Lobby,
            escape_mode: false,
            dark_mode,
            win_announced: false,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Maze dimensions requested at creation, as `(width, height)`.
    pub fn maze_size(&self) -> (u16, u16) {
        (self.maze_width, self.maze_height)
    }

    /// The host's uploaded level blob (full payload, tag included).
    pub fn maze_data(&self) -> Option<&[u8]> {
        self.maze_data.as_deref()
    }

    /// Occupants in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn guest(&self) -> Option<&Player> {
        self.players.iter().find(|p| !p.is_host)
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_escape_mode(&self) -> bool {
        self.escape_mode
    }

    pub fn is_dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// The lobby snapshot broadcast after membership or readiness changes.
    pub fn info(&self) -> RoomInfo {
        let guest = self.guest();
        RoomInfo {
            host_origin: self.host().map(|p| p.origin.clone()).unwrap_or_default(),
            guest_origin: guest.map(|p| p.origin.clone()).unwrap_or_default(),
            guest_ready: guest.is_some_and(|p| p.ready),
            dark_mode: self.dark_mode,
        }
    }

    // -- Delivery -----------------------------------------------------------

    /// Delivers a message to the chosen occupants.
    pub(crate) fn send(&self, recipient: Recipient, msg: ServerMessage) {
        match recipient {
            Recipient::All => {
                for p in &self.players {
                    p.send(msg.clone());
                }
            }
            Recipient::Player(id) => {
                if let Some(p) = self.player(id) {
                    p.send(msg);
                }
            }
            Recipient::AllExcept(excluded) => {
                for p in self.players.iter().filter(|p| p.id != excluded) {
                    p.send(msg.clone());
                }
            }
        }
    }

    /// Sends the current [`RoomInfo`] to every occupant.
    pub(crate) fn broadcast_info(&self) {
        self.send(Recipient::All, ServerMessage::RoomInfo(self.info()));
    }

    // -- Transitions --------------------------------------------------------

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, RoomError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RoomError::NotInRoom)
    }

    fn require_host(&self, id: PlayerId) -> Result<(), RoomError> {
        match self.player(id) {
            Some(p) if p.is_host => Ok(()),
            Some(_) => Err(RoomError::NotHost),
            None => Err(RoomError::NotInRoom),
        }
    }

    fn require_member(&self, id: PlayerId) -> Result<(), RoomError> {
        self.player(id).map(|_| ()).ok_or(RoomError::NotInRoom)
    }

    fn require_active(&self, id: PlayerId) -> Result<(), RoomError> {
        self.require_member(id)?;
        if !self.state.is_active() {
            return Err(RoomError::NotStarted);
        }
        Ok(())
    }

    /// Seats a guest. On success the guest gets `RoomJoined`, then either
    /// the stored maze or (if none yet) the host gets `RequestMaze`, then
    /// both get room info.
    pub(crate) fn add_guest(&mut self, guest: Player) -> Result<(), RoomError> {
        if self.is_full() {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        let guest_id = guest.id;
        self.players.push(guest);

        self.send(
            Recipient::Player(guest_id),
            ServerMessage::RoomJoined {
                code: self.code.clone(),
            },
        );
        match &self.maze_data {
            Some(maze) => {
                self.send(Recipient::Player(guest_id), ServerMessage::Relay(maze.clone()));
            }
            None => {
                if let Some(host) = self.host() {
                    host.send(ServerMessage::RequestMaze);
                }
            }
        }
        self.broadcast_info();
        Ok(())
    }

    /// Stores the host's maze upload and forwards it to a seated guest.
    /// Does not start the round.
    pub(crate) fn set_maze(
        &mut self,
        sender: PlayerId,
        escape_mode: Option<bool>,
        raw: Vec<u8>,
    ) -> Result<(), RoomError> {
        self.require_host(sender)?;
        if let Some(escape) = escape_mode {
            self.escape_mode = escape;
        }
        if self.players.len() == MAX_PLAYERS {
            self.send(Recipient::AllExcept(sender), ServerMessage::Relay(raw.clone()));
        }
        self.maze_data = Some(raw);
        Ok(())
    }

    /// Updates the sender's readiness, echoes the raw message to the
    /// other occupant, then broadcasts room info.
    pub(crate) fn set_ready(
        &mut self,
        sender: PlayerId,
        ready: bool,
        raw: Vec<u8>,
    ) -> Result<(), RoomError> {
        self.player_mut(sender)?.ready = ready;
        self.send(Recipient::AllExcept(sender), ServerMessage::Relay(raw));
        self.broadcast_info();
        Ok(())
    }

    /// Lobby → Active. Host only, with a ready guest seated.
    ///
    /// Readiness is cleared for everyone so the next return to the lobby
    /// needs a fresh confirmation.
    pub(crate) fn start(&mut self, sender: PlayerId) -> Result<(), RoomError> {
        self.require_host(sender)?;
        if self.state.is_active() {
            return Err(RoomError::AlreadyStarted);
        }
        let guest_ready = self.guest().is_some_and(|g| g.ready);
        if self.players.len() != MAX_PLAYERS || !guest_ready {
            return Err(RoomError::NotReady);
        }

        self.state = RoomState::Active;
        self.win_announced = false;
        for p in &mut self.players {
            p.ready = false;
            p.reached_exit = false;
        }
        self.send(Recipient::All, ServerMessage::GameStart);
        Ok(())
    }

    /// Forwards an opaque in-round payload to the other occupant.
    pub(crate) fn relay(&self, sender: PlayerId, raw: Vec<u8>) -> Result<(), RoomError> {
        self.require_active(sender)?;
        self.send(Recipient::AllExcept(sender), ServerMessage::Relay(raw));
        Ok(())
    }

    /// Marks the sender as having reached the exit and relays the event.
    ///
    /// Win detection re-runs on every call, so arrival order does not
    /// matter; the flag keeps `GameWin` to one broadcast per round. When
    /// this call completes the round, `GameWin` goes out before the
    /// relayed event. Returns `true` if this call announced the win.
    pub(crate) fn reach_exit(&mut self, sender: PlayerId, raw: Vec<u8>) -> Result<bool, RoomError> {
        self.require_active(sender)?;
        self.player_mut(sender)?.reached_exit = true;

        let all_reached = self.players.iter().all(|p| p.reached_exit);
        let announce = all_reached && !self.win_announced;
        if announce {
            self.win_announced = true;
            self.send(Recipient::All, ServerMessage::GameWin);
        }
        self.send(Recipient::AllExcept(sender), ServerMessage::Relay(raw));
        Ok(announce)
    }

    /// Returns the room to the lobby on the sender's request.
    ///
    /// The sender's readiness becomes its host flag. The other player's
    /// readiness is left alone: it may already be back and readied.
    pub(crate) fn restart(&mut self, sender: PlayerId, raw: Vec<u8>) -> Result<(), RoomError> {
        self.require_member(sender)?;
        self.state = RoomState::Lobby;
        self.win_announced = false;
        for p in &mut self.players {
            p.reached_exit = false;
            if p.id == sender {
                p.ready = p.is_host;
            }
        }
        self.send(Recipient::AllExcept(sender), ServerMessage::Relay(raw));
        self.broadcast_info();
        Ok(())
    }

    /// Removes a player and settles the room around the gap.
    ///
    /// With players remaining, the room drops back to the lobby, exit
    /// progress is cleared, and a departed host's role passes to the
    /// first remaining player, who is forced ready. Each remaining player
    /// is told `PlayerLeft` with its own host flag, then room info goes out.
    pub(crate) fn depart(&mut self, id: PlayerId) -> Departure {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return Departure::Absent;
        };
        let leaver = self.players.remove(index);
        if self.players.is_empty() {
            return Departure::Emptied;
        }

        self.state = RoomState::Lobby;
        self.win_announced = false;
        for p in &mut self.players {
            p.reached_exit = false;
        }
        if leaver.is_host {
            let heir = &mut self.players[0];
            heir.is_host = true;
            heir.ready = true;
        }

        for p in &self.players {
            p.send(ServerMessage::PlayerLeft { is_host: p.is_host });
        }
        self.broadcast_info();
        Departure::Remaining {
            host_migrated: leaver.is_host,
        }
    }
}
