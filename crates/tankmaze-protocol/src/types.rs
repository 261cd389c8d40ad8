//! Core protocol types: identities, room codes, and message type tags.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// One connection is one player, so the relay derives this from the
/// transport's connection ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The short code players type to find a room.
///
/// Codes the server generates are always four ASCII digits. Codes a
/// client sends in `JoinRoom` are kept verbatim (lossy UTF-8) so a typo
/// simply fails the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Smallest number a generated code can take.
    pub const MIN: u16 = 1000;
    /// Largest number a generated code can take.
    pub const MAX: u16 = 9999;

    /// Builds the code for a number in [`MIN`](Self::MIN)..=[`MAX`](Self::MAX).
    ///
    /// Returns `None` outside that range, so every generated code is
    /// exactly four digits with no leading zero.
    pub fn from_number(n: u16) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&n)
            .then(|| Self(n.to_string()))
    }

    /// Wraps code bytes received from a client.
    pub fn from_wire(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns the code as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Specifies which occupants of a room receive a server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the given player (the "other occupant").
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The one-byte tag that starts every payload.
///
/// Values are fixed by the game client and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Connect = 1,
    ConnectAck = 2,
    Disconnect = 3,
    CreateRoom = 4,
    JoinRoom = 5,
    RoomCreated = 6,
    RoomJoined = 7,
    RoomError = 8,
    GameStart = 9,
    PlayerUpdate = 10,
    PlayerShoot = 11,
    MazeData = 12,
    RequestMaze = 13,
    ReachExit = 14,
    GameWin = 15,
    GameResult = 16,
    RestartRequest = 17,
    NpcActivate = 18,
    NpcUpdate = 19,
    NpcShoot = 20,
    NpcDamage = 21,
    WallPlace = 22,
    ClimaxStart = 23,
    PlayerLeft = 24,
    RescueStart = 25,
    RescueProgress = 26,
    RescueComplete = 27,
    RescueCancel = 28,
    PlayerReady = 29,
    HostStartGame = 30,
    RoomInfo = 31,
    WallDamage = 32,
}

impl MessageType {
    /// Returns the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Returns `true` for gameplay telemetry the relay forwards untouched
    /// while a round is running.
    pub fn is_gameplay_relay(self) -> bool {
        matches!(
            self,
            Self::PlayerUpdate
                | Self::PlayerShoot
                | Self::NpcActivate
                | Self::NpcUpdate
                | Self::NpcShoot
                | Self::NpcDamage
                | Self::WallPlace
                | Self::WallDamage
                | Self::ClimaxStart
                | Self::RescueStart
                | Self::RescueProgress
                | Self::RescueComplete
                | Self::RescueCancel
        )
    }

    /// Returns `true` for tags only the server originates.
    pub fn is_server_only(self) -> bool {
        matches!(
            self,
            Self::ConnectAck
                | Self::RoomCreated
                | Self::RoomJoined
                | Self::RoomError
                | Self::GameStart
                | Self::RequestMaze
                | Self::GameWin
                | Self::PlayerLeft
                | Self::RoomInfo
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            1 => Self::Connect,
            2 => Self::ConnectAck,
            3 => Self::Disconnect,
            4 => Self::CreateRoom,
            5 => Self::JoinRoom,
            6 => Self::RoomCreated,
            7 => Self::RoomJoined,
            8 => Self::RoomError,
            9 => Self::GameStart,
            10 => Self::PlayerUpdate,
            11 => Self::PlayerShoot,
            12 => Self::MazeData,
            13 => Self::RequestMaze,
            14 => Self::ReachExit,
            15 => Self::GameWin,
            16 => Self::GameResult,
            17 => Self::RestartRequest,
            18 => Self::NpcActivate,
            19 => Self::NpcUpdate,
            20 => Self::NpcShoot,
            21 => Self::NpcDamage,
            22 => Self::WallPlace,
            23 => Self::ClimaxStart,
            24 => Self::PlayerLeft,
            25 => Self::RescueStart,
            26 => Self::RescueProgress,
            27 => Self::RescueComplete,
            28 => Self::RescueCancel,
            29 => Self::PlayerReady,
            30 => Self::HostStartGame,
            31 => Self::RoomInfo,
            32 => Self::WallDamage,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tags_round_trip_for_whole_range() {
        for tag in 1..=32u8 {
            let kind = MessageType::try_from(tag).expect("known tag");
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn test_message_type_unknown_tags_rejected() {
        assert_eq!(MessageType::try_from(0), Err(0));
        assert_eq!(MessageType::try_from(33), Err(33));
        assert_eq!(MessageType::try_from(255), Err(255));
    }

    #[test]
    fn test_message_type_stable_values() {
        assert_eq!(MessageType::CreateRoom.tag(), 4);
        assert_eq!(MessageType::RoomError.tag(), 8);
        assert_eq!(MessageType::PlayerLeft.tag(), 24);
        assert_eq!(MessageType::RoomInfo.tag(), 31);
        assert_eq!(MessageType::WallDamage.tag(), 32);
    }

    #[test]
    fn test_gameplay_relay_and_server_only_are_disjoint() {
        for tag in 1..=32u8 {
            let kind = MessageType::try_from(tag).unwrap();
            assert!(!(kind.is_gameplay_relay() && kind.is_server_only()));
        }
        assert!(MessageType::WallDamage.is_gameplay_relay());
        assert!(!MessageType::ReachExit.is_gameplay_relay());
        assert!(!MessageType::GameResult.is_gameplay_relay());
    }

    #[test]
    fn test_room_code_from_number_bounds() {
        assert_eq!(RoomCode::from_number(1000).unwrap().as_str(), "1000");
        assert_eq!(RoomCode::from_number(9999).unwrap().as_str(), "9999");
        assert!(RoomCode::from_number(999).is_none());
        assert!(RoomCode::from_number(10000).is_none());
    }

    #[test]
    fn test_room_code_from_wire_is_verbatim() {
        assert_eq!(RoomCode::from_wire(b"4821").to_string(), "4821");
        assert_eq!(RoomCode::from_wire(b"").as_str(), "");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }
}
