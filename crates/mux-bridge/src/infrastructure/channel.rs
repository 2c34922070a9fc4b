//! Session channel to the mux: connect, handshake, framed I/O, close.
//!
//! # Streaming
//!
//! The channel is a byte stream, so one `read()` may return part of a frame
//! or several frames at once.  [`FrameReader`] buffers incoming bytes and
//! uses the header's declared length to cut complete frames out of the
//! buffer.  Because the length is known before the payload is decoded, a
//! frame whose payload is garbage can be dropped on its own and the next
//! frame still lines up.
//!
//! # Ownership
//!
//! [`BridgeSession::connect`] returns the two directions of the channel as
//! independent halves.  The inbound loop owns the reader and the outbound
//! loop owns the writer, so no lock is needed between them.  The session
//! itself only tracks identity and state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, info};

use mux_core::protocol::messages::HelloMessage;
use mux_core::{
    decode_message, encode_message, frame_length, ChannelAddress, MuxMessage, ProtocolError,
    SessionId, SessionState,
};

const READ_CHUNK: usize = 4096;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Mid-session I/O failure.  Ends the loop that hit it.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("channel write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("channel closed mid-frame with {0} bytes buffered")]
    Truncated(usize),

    /// The header itself is unusable, so frame boundaries are lost.
    #[error("channel stream desynchronised: {0}")]
    Desync(#[source] ProtocolError),

    #[error("cannot encode outbound frame: {0}")]
    Encode(#[source] ProtocolError),
}

/// Failure to open the session channel.  Fatal to bridge startup.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot connect to {address}: {source}")]
    Refused {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("handshake with {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: ChannelError,
    },

    #[error("session is {0:?}, cannot connect")]
    InvalidState(SessionState),
}

// ── Framed halves ─────────────────────────────────────────────────────────────

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cuts complete frames out of a byte stream.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(READ_CHUNK),
            chunk: vec![0u8; READ_CHUNK],
        }
    }

    /// Reads the next frame.
    ///
    /// - `Ok(Some(Ok(msg)))`: a decoded message.
    /// - `Ok(Some(Err(e)))`: a complete frame that did not decode.  It has
    ///   been consumed; the next call continues with the following frame.
    /// - `Ok(None)`: the peer closed the stream on a frame boundary.
    ///
    /// # Errors
    ///
    /// [`ChannelError`] when the stream fails, ends mid-frame, or carries a
    /// header declaring an oversized payload.
    pub async fn next_frame(
        &mut self,
    ) -> Result<Option<Result<MuxMessage, ProtocolError>>, ChannelError> {
        loop {
            match frame_length(&self.buf) {
                Ok(len) if self.buf.len() >= len => {
                    let frame: Vec<u8> = self.buf.drain(..len).collect();
                    return Ok(Some(decode_message(&frame).map(|(msg, _)| msg)));
                }
                Ok(_) => {}
                Err(e) if e.is_incomplete() => {}
                Err(e) => return Err(ChannelError::Desync(e)),
            }

            let n = self
                .inner
                .read(&mut self.chunk)
                .await
                .map_err(ChannelError::Read)?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ChannelError::Truncated(self.buf.len()));
            }
            self.buf.extend_from_slice(&self.chunk[..n]);
        }
    }
}

/// Encodes and writes whole frames.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, msg: &MuxMessage) -> Result<(), ChannelError> {
        let bytes = encode_message(msg).map_err(ChannelError::Encode)?;
        self.inner
            .write_all(&bytes)
            .await
            .map_err(ChannelError::Write)?;
        self.inner.flush().await.map_err(ChannelError::Write)
    }
}

/// Both directions of an open session channel.
pub struct SessionChannel {
    pub reader: FrameReader<BoxedReader>,
    pub writer: FrameWriter<BoxedWriter>,
}

impl SessionChannel {
    pub fn from_halves(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Identity and lifecycle of the one channel a bridge opens.
#[derive(Debug)]
pub struct BridgeSession {
    id: SessionId,
    address: ChannelAddress,
    auth_token: Option<String>,
    state: AtomicU8,
}

fn state_to_u8(state: SessionState) -> u8 {
    match state {
        SessionState::Unresolved => 0,
        SessionState::Connected => 1,
        SessionState::Closed => 2,
    }
}

fn state_from_u8(value: u8) -> SessionState {
    match value {
        0 => SessionState::Unresolved,
        1 => SessionState::Connected,
        _ => SessionState::Closed,
    }
}

impl BridgeSession {
    pub fn new(id: SessionId, address: ChannelAddress, auth_token: Option<String>) -> Self {
        Self {
            id,
            address,
            auth_token,
            state: AtomicU8::new(state_to_u8(SessionState::Unresolved)),
        }
    }

    pub fn state(&self) -> SessionState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    /// Opens the channel and sends `Hello` as its first frame.
    ///
    /// # Errors
    ///
    /// [`ConnectionError`] on refusal, on timeout, on a failed handshake
    /// write, or if this session was already connected or closed.
    pub async fn connect(&self, timeout: Duration) -> Result<SessionChannel, ConnectionError> {
        let current = self.state();
        if current != SessionState::Unresolved {
            return Err(ConnectionError::InvalidState(current));
        }

        let address = self.address.to_string();
        let channel = tokio::time::timeout(timeout, self.open_and_greet())
            .await
            .map_err(|_| ConnectionError::Timeout {
                address: address.clone(),
                timeout,
            })??;

        // Lost a race with close(): the channel is dropped here.
        self.state
            .compare_exchange(
                state_to_u8(SessionState::Unresolved),
                state_to_u8(SessionState::Connected),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| ConnectionError::InvalidState(state_from_u8(actual)))?;

        info!("session {} connected to {address}", self.id);
        Ok(channel)
    }

    async fn open_and_greet(&self) -> Result<SessionChannel, ConnectionError> {
        let address = self.address.to_string();
        let refused = |source| ConnectionError::Refused {
            address: address.clone(),
            source,
        };

        let mut channel = match &self.address {
            ChannelAddress::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(refused)?;
                let (read, write) = stream.into_split();
                SessionChannel::from_halves(Box::new(read), Box::new(write))
            }
            ChannelAddress::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(refused)?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("session {}: cannot disable Nagle on {address}: {e}", self.id);
                }
                let (read, write) = stream.into_split();
                SessionChannel::from_halves(Box::new(read), Box::new(write))
            }
        };

        let hello = MuxMessage::Hello(HelloMessage {
            session_id: self.id.get(),
            auth_token: self.auth_token.clone(),
        });
        channel
            .writer
            .send(&hello)
            .await
            .map_err(|source| ConnectionError::Handshake {
                address: address.clone(),
                source,
            })?;
        debug!("session {}: hello sent", self.id);
        Ok(channel)
    }

    /// Marks the session closed.  Returns `false` if it already was.
    ///
    /// The socket itself closes when the loops drop their halves.
    pub fn close(&self) -> bool {
        let previous = self
            .state
            .swap(state_to_u8(SessionState::Closed), Ordering::AcqRel);
        let changed = state_from_u8(previous) != SessionState::Closed;
        if changed {
            info!("session {} closed", self.id);
        }
        changed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
