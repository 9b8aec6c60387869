//! Framing for the browser remote debugging protocol.
//!
//! Every message on the wire is `<byte length>:<utf-8 json>`. Inbound bytes
//! are accumulated in a [`FrameDecoder`] which peels complete frames as they
//! become available, independent of how the stream was chunked.

pub mod rdp;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub use rdp::{RdpClient, RdpError, RdpEvent, RetryPolicy};

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Longest decimal prefix we accept before a colon must appear.
const MAX_PREFIX_DIGITS: usize = 20;

/// Unrecoverable framing errors. The connection must be torn down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame length prefix: {0:?}")]
    InvalidLength(String),

    #[error("frame exceeds max length ({len} > {max})")]
    TooLarge { len: usize, max: usize },
}

/// Outcome of peeling one complete frame.
#[derive(Debug)]
pub enum Decoded {
    Message(serde_json::Value),
    /// The frame was complete but its payload was not JSON. The stream is
    /// still in sync and decoding can continue.
    Malformed {
        error: serde_json::Error,
        raw: Vec<u8>,
    },
}

pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let mut out = format!("{}:", json.len()).into_bytes();
    out.extend_from_slice(&json);
    Ok(out)
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(&frame).await
}

/// Growing receive buffer for length-prefixed frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Peel one frame off the front of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Decoded>, FrameError> {
        let Some(colon) = self.buf.iter().position(|b| *b == b':') else {
            if self.buf.len() > MAX_PREFIX_DIGITS || !self.buf.iter().all(u8::is_ascii_digit) {
                return Err(FrameError::InvalidLength(
                    String::from_utf8_lossy(&self.buf[..self.buf.len().min(32)]).into_owned(),
                ));
            }
            return Ok(None);
        };

        let prefix = &self.buf[..colon];
        let len = std::str::from_utf8(prefix)
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| FrameError::InvalidLength(String::from_utf8_lossy(prefix).into_owned()))?;

        if len > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }

        let start = colon + 1;
        let end = start + len;
        if self.buf.len() < end {
            return Ok(None);
        }

        let payload: Vec<u8> = self.buf[start..end].to_vec();
        self.buf.drain(..end);

        Ok(Some(match serde_json::from_slice(&payload) {
            Ok(value) => Decoded::Message(value),
            Err(error) => Decoded::Malformed {
                error,
                raw: payload,
            },
        }))
    }
}
