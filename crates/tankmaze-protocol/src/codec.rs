//! Frame codec: length-prefixed framing over a byte stream.
//!
//! Every message in both directions travels as one frame:
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ len: u16 LE  │ payload (len bytes)       │
//! └──────────────┴───────────────────────────┘
//! ```
//!
//! TCP delivers bytes, not messages, so a single read can hold half a
//! frame, exactly one, or several. [`FrameBuffer`] accumulates reads and
//! hands out complete payloads in arrival order. A frame whose payload
//! has not fully arrived blocks everything behind it; it is never
//! truncated or skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Initial capacity of a [`FrameBuffer`].
const INITIAL_CAPACITY: usize = 4096;

/// Wraps a payload in a frame: little-endian `u16` length, then the bytes.
///
/// # Errors
/// Returns [`ProtocolError::PayloadTooLong`] if the payload exceeds
/// [`MAX_PAYLOAD`].
pub fn encode_frame(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| ProtocolError::PayloadTooLong(payload.len()))?;
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX + payload.len());
    frame.put_u16_le(len);
    frame.put_slice(payload);
    Ok(frame)
}

/// Reassembles frames from an inbound byte stream.
///
/// Feed it every chunk the socket yields with [`extend`](Self::extend),
/// then call [`next_frame`](Self::next_frame) until it returns `Ok(None)`.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    /// Optional cap on declared payload length. `None` accepts anything
    /// the 16-bit prefix can express.
    max_payload: Option<usize>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_max_payload(None)
    }
}

impl FrameBuffer {
    /// Creates an empty buffer with no payload cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer that rejects frames declaring more than
    /// `max_payload` bytes.
    pub fn with_max_payload(max_payload: Option<usize>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_payload,
        }
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extracts the next complete payload, if one is buffered.
    ///
    /// Returns `Ok(None)` when fewer than `2 + len` bytes are available;
    /// the partial frame stays buffered for the next read.
    ///
    /// # Errors
    /// Returns [`ProtocolError::FrameTooLarge`] when a payload cap is set
    /// and the next frame's declared length exceeds it. The offending
    /// bytes are left in place; the stream is unrecoverable.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.len() < LENGTH_PREFIX {
            return Ok(None);
        }
        // Peek without consuming.
        let len = usize::from((&self.buffer[..LENGTH_PREFIX]).get_u16_le());

        if let Some(max) = self.max_payload {
            if len > max {
                return Err(ProtocolError::FrameTooLarge { len, max });
            }
        }

        if self.buffer.len() < LENGTH_PREFIX + len {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Number of bytes currently buffered (complete or not).
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
