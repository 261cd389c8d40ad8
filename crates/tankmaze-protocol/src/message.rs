//! Tagged binary message layouts.
//!
//! A frame's payload always starts with a [`MessageType`] tag. The rest
//! of the layout depends on the tag:
//!
//! | Message        | Layout after the tag                                      |
//! |----------------|-----------------------------------------------------------|
//! | `CreateRoom`   | width u16 LE, height u16 LE, optional dark-mode u8        |
//! | `JoinRoom`     | code length u8, code bytes                                |
//! | `RoomCreated`  | code length u8, code bytes                                |
//! | `RoomJoined`   | code length u8, code bytes                                |
//! | `RoomError`    | message length u8, message bytes                          |
//! | `RoomInfo`     | host len u8, host, guest len u8, guest, guest-ready u8, dark u8 |
//! | `PlayerLeft`   | recipient-is-host u8                                      |
//! | `PlayerReady`  | ready u8                                                  |
//! | `MazeData`     | escape-mode u8, opaque level data                         |
//!
//! Everything else is either tag-only or opaque gameplay telemetry that
//! the relay passes through byte-for-byte. Opaque messages keep their
//! full received payload (tag included) in a `raw` field so forwarding
//! never re-encodes them.

use bytes::{Buf, BufMut};

use crate::{MessageType, ProtocolError, RoomCode};

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a payload. Every short read becomes a
/// [`ProtocolError::Truncated`] naming the message being decoded.
struct Reader<'a> {
    kind: MessageType,
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    /// Starts reading just past the tag byte.
    fn new(kind: MessageType, payload: &'a [u8]) -> Self {
        Self {
            kind,
            buf: payload.get(1..).unwrap_or_default(),
            total: payload.len(),
        }
    }

    fn ensure(&self, n: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::Truncated {
                kind: self.kind,
                expected: self.total - self.buf.remaining() + n,
                actual: self.total,
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16_le(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    fn flag(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    /// A string preceded by a one-byte length.
    fn short_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = usize::from(self.u8()?);
        self.ensure(len)?;
        let (field, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(field)
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}

/// Appends a one-byte length then the bytes.
fn put_short(
    out: &mut impl BufMut,
    field: &'static str,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    let len = u8::try_from(bytes.len())
        .map_err(|_| ProtocolError::FieldTooLong { field, len: bytes.len() })?;
    out.put_u8(len);
    out.put_slice(bytes);
    Ok(())
}

/// Reads the tag byte.
fn read_tag(payload: &[u8]) -> Result<MessageType, ProtocolError> {
    let tag = *payload.first().ok_or(ProtocolError::Empty)?;
    MessageType::try_from(tag).map_err(ProtocolError::UnknownTag)
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// A message a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Initial hello; answered with `ConnectAck`.
    Connect,

    /// The client is leaving; the server closes the connection.
    Disconnect,

    /// Open a new room with the sender as host.
    CreateRoom {
        maze_width: u16,
        maze_height: u16,
        dark_mode: bool,
    },

    /// Join an existing room by code.
    JoinRoom { code: RoomCode },

    /// The host's level blob. `escape_mode` is `None` when the payload is
    /// just the tag and carries no mode byte.
    MazeData {
        escape_mode: Option<bool>,
        raw: Vec<u8>,
    },

    /// The sender toggled its readiness.
    PlayerReady { ready: bool, raw: Vec<u8> },

    /// The host asks to start the round.
    HostStartGame,

    /// The sender reached the maze exit.
    ReachExit { raw: Vec<u8> },

    /// End-of-round result, relayed as-is.
    GameResult { raw: Vec<u8> },

    /// The sender went back to the lobby.
    RestartRequest { raw: Vec<u8> },

    /// Opaque gameplay telemetry (see [`MessageType::is_gameplay_relay`]).
    Gameplay { kind: MessageType, raw: Vec<u8> },
}

impl ClientMessage {
    /// Decodes a frame payload received from a client.
    ///
    /// # Errors
    /// - [`ProtocolError::Empty`] for a zero-length payload
    /// - [`ProtocolError::UnknownTag`] for a tag outside the enumeration
    /// - [`ProtocolError::NotClientMessage`] for a server-only tag
    /// - [`ProtocolError::Truncated`] when the layout needs more bytes
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let kind = read_tag(payload)?;
        if kind.is_server_only() {
            return Err(ProtocolError::NotClientMessage(kind));
        }
        let mut r = Reader::new(kind, payload);

        let msg = match kind {
            MessageType::Connect => Self::Connect,
            MessageType::Disconnect => Self::Disconnect,
            MessageType::CreateRoom => {
                let maze_width = r.u16_le()?;
                let maze_height = r.u16_le()?;
                let dark_mode = if r.remaining() > 0 { r.flag()? } else { false };
                Self::CreateRoom {
                    maze_width,
                    maze_height,
                    dark_mode,
                }
            }
            MessageType::JoinRoom => Self::JoinRoom {
                code: RoomCode::from_wire(r.short_bytes()?),
            },
            MessageType::MazeData => Self::MazeData {
                escape_mode: if r.remaining() > 0 { Some(r.flag()?) } else { None },
                raw: payload.to_vec(),
            },
            MessageType::PlayerReady => Self::PlayerReady {
                ready: r.flag()?,
                raw: payload.to_vec(),
            },
            MessageType::HostStartGame => Self::HostStartGame,
            MessageType::ReachExit => Self::ReachExit {
                raw: payload.to_vec(),
            },
            MessageType::GameResult => Self::GameResult {
                raw: payload.to_vec(),
            },
            MessageType::RestartRequest => Self::RestartRequest {
                raw: payload.to_vec(),
            },
            kind if kind.is_gameplay_relay() => Self::Gameplay {
                kind,
                raw: payload.to_vec(),
            },
            kind => return Err(ProtocolError::NotClientMessage(kind)),
        };
        Ok(msg)
    }

    /// Returns the message's type tag.
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Connect => MessageType::Connect,
            Self::Disconnect => MessageType::Disconnect,
            Self::CreateRoom { .. } => MessageType::CreateRoom,
            Self::JoinRoom { .. } => MessageType::JoinRoom,
            Self::MazeData { .. } => MessageType::MazeData,
            Self::PlayerReady { .. } => MessageType::PlayerReady,
            Self::HostStartGame => MessageType::HostStartGame,
            Self::ReachExit { .. } => MessageType::ReachExit,
            Self::GameResult { .. } => MessageType::GameResult,
            Self::RestartRequest { .. } => MessageType::RestartRequest,
            Self::Gameplay { kind, .. } => *kind,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Lobby snapshot broadcast to every occupant after membership or
/// readiness changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomInfo {
    /// Connection-origin label of the host; empty if none.
    pub host_origin: String,
    /// Connection-origin label of the guest; empty if none.
    pub guest_origin: String,
    /// Whether the guest has readied up. `false` with no guest.
    pub guest_ready: bool,
    /// The room's dark-mode flag, fixed at creation.
    pub dark_mode: bool,
}

/// A message the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ConnectAck,
    RoomCreated { code: RoomCode },
    RoomJoined { code: RoomCode },
    RoomError { message: String },
    GameStart,
    RequestMaze,
    GameWin,
    /// The other occupant left. `is_host` is the recipient's own host
    /// flag after any migration.
    PlayerLeft { is_host: bool },
    RoomInfo(RoomInfo),
    /// A client payload forwarded verbatim.
    Relay(Vec<u8>),
}

impl ServerMessage {
    /// Encodes the message into a frame payload (without the length prefix).
    ///
    /// # Errors
    /// Returns [`ProtocolError::FieldTooLong`] if a length-prefixed string
    /// exceeds 255 bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out: Vec<u8> = Vec::new();
        match self {
            Self::ConnectAck => out.put_u8(MessageType::ConnectAck.tag()),
            Self::RoomCreated { code } => {
                out.put_u8(MessageType::RoomCreated.tag());
                put_short(&mut out, "code", code.as_str().as_bytes())?;
            }
            Self::RoomJoined { code } => {
                out.put_u8(MessageType::RoomJoined.tag());
                put_short(&mut out, "code", code.as_str().as_bytes())?;
            }
            Self::RoomError { message } => {
                out.put_u8(MessageType::RoomError.tag());
                put_short(&mut out, "message", message.as_bytes())?;
            }
            Self::GameStart => out.put_u8(MessageType::GameStart.tag()),
            Self::RequestMaze => out.put_u8(MessageType::RequestMaze.tag()),
            Self::GameWin => out.put_u8(MessageType::GameWin.tag()),
            Self::PlayerLeft { is_host } => {
                out.put_u8(MessageType::PlayerLeft.tag());
                out.put_u8(u8::from(*is_host));
            }
            Self::RoomInfo(info) => {
                out.put_u8(MessageType::RoomInfo.tag());
                put_short(&mut out, "host_origin", info.host_origin.as_bytes())?;
                put_short(&mut out, "guest_origin", info.guest_origin.as_bytes())?;
                out.put_u8(u8::from(info.guest_ready));
                out.put_u8(u8::from(info.dark_mode));
            }
            Self::Relay(raw) => out.put_slice(raw),
        }
        Ok(out)
    }

    /// Decodes a payload received from the relay.
    ///
    /// This is the client-side view. Any known tag without a server
    /// layout of its own is returned as [`ServerMessage::Relay`].
    ///
    /// # Errors
    /// Returns the same errors as [`ClientMessage::decode`], minus
    /// `NotClientMessage`.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let kind = read_tag(payload)?;
        let mut r = Reader::new(kind, payload);

        let msg = match kind {
            MessageType::ConnectAck => Self::ConnectAck,
            MessageType::RoomCreated => Self::RoomCreated {
                code: RoomCode::from_wire(r.short_bytes()?),
            },
            MessageType::RoomJoined => Self::RoomJoined {
                code: RoomCode::from_wire(r.short_bytes()?),
            },
            MessageType::RoomError => Self::RoomError {
                message: String::from_utf8_lossy(r.short_bytes()?).into_owned(),
            },
            MessageType::GameStart => Self::GameStart,
            MessageType::RequestMaze => Self::RequestMaze,
            MessageType::GameWin => Self::GameWin,
            MessageType::PlayerLeft => Self::PlayerLeft { is_host: r.flag()? },
            MessageType::RoomInfo => {
                let host_origin = String::from_utf8_lossy(r.short_bytes()?).into_owned();
                let guest_origin = String::from_utf8_lossy(r.short_bytes()?).into_owned();
                Self::RoomInfo(RoomInfo {
                    host_origin,
                    guest_origin,
                    guest_ready: r.flag()?,
                    dark_mode: r.flag()?,
                })
            }
            _ => Self::Relay(payload.to_vec()),
        };
        Ok(msg)
    }
}
