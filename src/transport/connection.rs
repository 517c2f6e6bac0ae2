//! Framed TCP connection to the dispatcher.
//!
//! Owns the single socket and provides blocking-style read-one-frame and
//! write-one-frame operations over it.
//!
//! # Framing
//!
//! Frames are explicitly delimited: a 4-byte big-endian length prefix
//! followed by the body. TCP is a byte stream — a single read may return a
//! partial frame or coalesce several — so the reader buffers until a full
//! frame is available before handing the body to the codec. One
//! `write_frame` emits exactly one decodable envelope.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ len: u32 BE  │ body: len bytes          │
//! └──────────────┴──────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::MAX_FRAME_LEN;

// ============================================================================
// Connection
// ============================================================================

/// An established, framed connection to the dispatcher.
///
/// Split into its read and write halves immediately after connecting: the
/// dispatch loop takes the reader, the transport facade keeps the writer.
#[derive(Debug)]
pub struct Connection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer: SocketAddr,
}

impl Connection {
    /// Connects to the dispatcher endpoint.
    ///
    /// The connection is established eagerly; there is no automatic re-dial
    /// on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connection cannot be made.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::connection(e.to_string()))?;
        let peer = stream.peer_addr().map_err(|e| Error::connection(e.to_string()))?;
        let _ = stream.set_nodelay(true);

        debug!(%peer, "connected to dispatcher");

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer,
        })
    }

    /// Returns the dispatcher's address.
    #[inline]
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits the connection into its read and write halves.
    #[inline]
    #[must_use]
    pub fn split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

// ============================================================================
// FrameReader
// ============================================================================

/// Reads length-prefixed frames off a byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps a raw read half.
    #[inline]
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads one complete frame body.
    ///
    /// Returns `Ok(None)` on clean end-of-stream at a frame boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooLarge`] if the prefix declares more than
    ///   [`MAX_FRAME_LEN`] bytes
    /// - [`Error::Decode`] on a zero-length frame
    /// - [`Error::Connection`] if the stream ends mid-frame
    /// - [`Error::Io`] on any other read failure
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 4];
        match self.inner.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len == 0 {
            return Err(Error::decode("zero-length frame"));
        }
        if len > MAX_FRAME_LEN {
            return Err(Error::frame_too_large(len, MAX_FRAME_LEN));
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::connection("stream ended mid-frame")
            } else {
                Error::from(e)
            }
        })?;

        trace!(len, "frame read");
        Ok(Some(body))
    }
}

// ============================================================================
// FrameWriter
// ============================================================================

/// Writes length-prefixed frames onto a byte stream.
///
/// Not internally synchronized: the transport facade holds the writer behind
/// a single lock so concurrent sends never interleave byte-for-byte.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wraps a raw write half.
    #[inline]
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Writes one frame: length prefix, then body.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    /// - [`Error::FrameTooLarge`] if the body exceeds [`MAX_FRAME_LEN`]
    /// - [`Error::Internal`] on I/O failure; the connection should be
    ///   considered possibly-corrupted thereafter
    pub async fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(Error::frame_too_large(body.len(), MAX_FRAME_LEN));
        }

        let prefix = (body.len() as u32).to_be_bytes();
        self.write_all(&prefix).await?;
        self.write_all(body).await?;
        self.inner
            .flush()
            .await
            .map_err(|e| Error::internal(format!("socket flush failed: {e}")))?;

        trace!(len = body.len(), "frame written");
        Ok(())
    }

    /// Shuts down the write side. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.inner.shutdown().await {
            debug!(error = %e, "socket shutdown failed");
        }
    }

    /// Returns `true` once the writer has been shut down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .await
            .map_err(|e| Error::internal(format!("socket write failed: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
