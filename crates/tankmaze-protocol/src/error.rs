//! Error types for the protocol layer.
//!
//! Every variant here describes bytes that could not be turned into a
//! message (or a message that could not be turned into bytes). None of
//! them is fatal to a connection: the handler logs and drops the frame,
//! except for [`ProtocolError::FrameTooLarge`], which means the stream
//! itself can no longer be trusted.

use crate::MessageType;

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A frame arrived with a zero-length payload (no type tag).
    #[error("empty payload")]
    Empty,

    /// The first payload byte is not a known message type.
    #[error("unknown message tag {0}")]
    UnknownTag(u8),

    /// A known tag that only the server sends arrived from a client.
    #[error("{0:?} is not a client message")]
    NotClientMessage(MessageType),

    /// The payload is shorter than its layout requires.
    #[error("{kind:?} truncated: need {expected} bytes, got {actual}")]
    Truncated {
        kind: MessageType,
        expected: usize,
        actual: usize,
    },

    /// An inbound frame declared a length above the configured cap.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// An outbound payload does not fit the 16-bit length prefix.
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLong(usize),

    /// A length-prefixed string field is longer than 255 bytes.
    #[error("field {field} is {len} bytes, max 255")]
    FieldTooLong { field: &'static str, len: usize },
}
