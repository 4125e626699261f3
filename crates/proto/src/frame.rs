//! Frame codec.
//!
//! ```text
//! Frame   := LEN (4 bytes, little-endian u32) || PAYLOAD (LEN bytes)
//! PAYLOAD := zlib(message)
//! ```
//!
//! No upper bound is placed on `LEN`. The body is read in fixed-size chunks so
//! a bogus length costs at most what the peer actually sends.

use std::io::{self, Read, Write};
use std::time::Duration;

use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::DEFAULT_STALL_TIMEOUT;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

const READ_CHUNK: usize = 8 * 1024;

/// Errors produced while encoding or decoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("payload is not a valid zlib stream: {0}")]
    Decompress(io::Error),
    #[error("message does not fit in a single frame ({0} bytes)")]
    TooLarge(usize),
    #[error("peer made no progress for {0:?} in the middle of a frame")]
    Stalled(Duration),
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Compress `message` and prepend its length.
pub fn encode(message: &[u8]) -> Result<Vec<u8>, FrameError> {
    let buffer = Vec::with_capacity(message.len() / 2 + 16);
    let mut encoder = ZlibEncoder::new(buffer, Compression::default());
    encoder.write_all(message)?;
    let compressed = encoder.finish()?;

    let len = u32::try_from(compressed.len()).map_err(|_| FrameError::TooLarge(compressed.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + compressed.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// Inflate one frame payload (the bytes after the length prefix).
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut message = Vec::with_capacity(payload.len() * 2);
    ZlibDecoder::new(payload).read_to_end(&mut message).map_err(FrameError::Decompress)?;
    Ok(message)
}

/// Encode `message` and write the whole frame to `writer`.
pub async fn write_frame<W>(writer: &mut W, message: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads whole frames from a byte stream, however the stream chops them up.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    stall_timeout: Duration,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self::with_stall_timeout(inner, DEFAULT_STALL_TIMEOUT)
    }

    /// Once the first byte of a frame has arrived, every subsequent read must
    /// complete within `stall_timeout`.
    pub fn with_stall_timeout(inner: R, stall_timeout: Duration) -> Self {
        Self { inner, stall_timeout }
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the stream ended, either cleanly between frames or in
    /// the middle of one.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut header = [0u8; HEADER_LEN];
        if !self.fill_header(&mut header).await? {
            return Ok(None);
        }

        let len = u32::from_le_bytes(header) as usize;
        let mut payload = Vec::with_capacity(len.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        let mut remaining = len;

        while remaining > 0 {
            let want = remaining.min(READ_CHUNK);
            let n = self.read_with_deadline(&mut chunk[..want]).await?;
            if n == 0 {
                let received = len - remaining;
                tracing::debug!(expected = len, received, "stream closed mid-frame");
                return Ok(None);
            }
            payload.extend_from_slice(&chunk[..n]);
            remaining -= n;
        }

        decompress(&payload).map(Some)
    }

    async fn fill_header(&mut self, header: &mut [u8; HEADER_LEN]) -> Result<bool, FrameError> {
        // Idle time before a frame starts is unbounded.
        let mut filled = self.inner.read(&mut header[..]).await?;
        if filled == 0 {
            return Ok(false);
        }

        while filled < HEADER_LEN {
            let n = self.read_with_deadline(&mut header[filled..]).await?;
            if n == 0 {
                return Ok(false);
            }
            filled += n;
        }
        Ok(true)
    }

    async fn read_with_deadline(&mut self, buf: &mut [u8]) -> Result<usize, FrameError> {
        match tokio::time::timeout(self.stall_timeout, self.inner.read(buf)).await {
            Ok(read) => Ok(read?),
            Err(_) => Err(FrameError::Stalled(self.stall_timeout)),
        }
    }
}
