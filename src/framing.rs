//! Length-prefixed frame protocol
//!
//! Wire format: a 4-byte little-endian unsigned length followed by exactly
//! that many payload bytes, repeated over a continuous byte stream. A length
//! above the configured maximum means the stream has desynced; that is a
//! protocol violation, not a plain disconnect, and can only be recovered by
//! reconnecting.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::LinkError;

/// Default upper bound on a single frame (16 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One decoded frame: an opaque, immutable byte sequence
pub type Frame = Bytes;

/// Decodes the frame protocol from a live session
///
/// The sequence is lazy, infinite and non-restartable: `next_frame` either
/// yields a frame or reports the error that invalidated the session. The
/// reader never recovers on its own; the owning adapter reconnects and
/// builds a fresh reader.
pub struct FrameReader<S> {
    io: S,
    max_frame_len: usize,
}

impl<S: AsyncRead + Unpin> FrameReader<S> {
    /// Wrap a live session with the default frame size bound
    pub fn new(io: S) -> Self {
        Self::with_max_frame_len(io, DEFAULT_MAX_FRAME_LEN)
    }

    /// Wrap a live session with an explicit frame size bound
    pub fn with_max_frame_len(io: S, max_frame_len: usize) -> Self {
        Self { io, max_frame_len }
    }

    /// Read exactly one frame
    ///
    /// Blocks until a full frame is available. Short reads and I/O errors
    /// surface as transport errors; an implausible length surfaces as a
    /// protocol violation. A zero length is a valid empty frame.
    pub async fn next_frame(&mut self) -> Result<Frame, LinkError> {
        let mut length_bytes = [0u8; 4];
        self.io.read_exact(&mut length_bytes).await?;
        let length = u32::from_le_bytes(length_bytes) as usize;

        if length > self.max_frame_len {
            return Err(LinkError::protocol_error(format!(
                "frame length {} exceeds maximum {}",
                length, self.max_frame_len
            )));
        }

        let mut payload = vec![0u8; length];
        self.io.read_exact(&mut payload).await?;
        Ok(Bytes::from(payload))
    }

    /// Give the underlying session back (e.g. to close it deterministically)
    pub fn into_inner(self) -> S {
        self.io
    }
}

/// Encode one frame in wire format
///
/// Used by hardware simulators and tests; real cameras produce this format
/// themselves.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(4 + payload.len());
    wire.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    wire.extend_from_slice(payload);
    wire
}
