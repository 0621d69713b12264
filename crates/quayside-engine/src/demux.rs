//! Multiplexed stdout/stderr stream decoding.
//!
//! Engines running containers without a TTY interleave stdout and stderr
//! over one connection as length-prefixed frames: a 1-byte stream selector,
//! 3 reserved bytes, a 4-byte big-endian payload length, then the payload.
//! Exec attach streams and container logs both arrive in this format.

use quayside_common::error::{QuaysideError, Result};

/// Size of the per-frame header.
const HEADER_LEN: usize = 8;

/// Logical channel a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Input channel (selector 0); never produced by the workloads here.
    Stdin,
    /// Standard output (selector 1).
    Stdout,
    /// Standard error (selector 2).
    Stderr,
}

impl StreamKind {
    /// Returns the selector byte used in the frame header.
    #[must_use]
    pub const fn selector(self) -> u8 {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }
}

/// Decodes a complete multiplexed stream into combined text.
///
/// Payload bytes from all frames are concatenated in stream order with the
/// headers stripped, then trimmed of leading and trailing whitespace. The
/// selector byte is not used for routing: probe output and console logs are
/// consumed as one combined text. Invalid UTF-8 is replaced rather than
/// rejected, since this is diagnostic output rather than a wire format.
///
/// # Errors
///
/// Returns [`QuaysideError::Decode`] if the stream ends mid-header or the
/// final frame's payload is shorter than its declared length. A truncated
/// stream means data was lost; silently returning the partial text would
/// hide that from the caller.
pub fn decode(stream: &[u8]) -> Result<String> {
    let mut payload = Vec::with_capacity(stream.len());
    let mut rest = stream;

    while !rest.is_empty() {
        if rest.len() < HEADER_LEN {
            return Err(QuaysideError::Decode {
                message: format!("truncated frame header: {} trailing bytes", rest.len()),
            });
        }
        let declared = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let frame_end = HEADER_LEN + declared;
        if rest.len() < frame_end {
            return Err(QuaysideError::Decode {
                message: format!(
                    "truncated frame payload: declared {declared} bytes, {} available",
                    rest.len() - HEADER_LEN
                ),
            });
        }
        payload.extend_from_slice(&rest[HEADER_LEN..frame_end]);
        rest = &rest[frame_end..];
    }

    Ok(String::from_utf8_lossy(&payload).trim().to_string())
}

/// Encodes one frame in the engine's multiplexed format.
///
/// The inverse of [`decode`], used by in-memory engines and tests to produce
/// streams the harness consumes exactly as it would a real engine's.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(kind.selector());
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
