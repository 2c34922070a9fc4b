//! Session discovery: asks the mux service where this bridge's channel lives.
//!
//! The exchange itself sits behind [`DiscoveryExchange`] so the resolver can
//! be tested without a running service.  [`ControlSocketExchange`] is the
//! real implementation: one request/reply over the service's control socket
//! at `<runtime_dir>/<service_name>.sock`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::{debug, info};

use mux_core::protocol::messages::{DiscoveryRequestMessage, MessageType};
use mux_core::{ChannelAddress, MuxMessage, ProtocolError, SessionId};

use super::channel::{ChannelError, FrameReader, FrameWriter};

/// Path resolution failed.  Fatal to bridge startup.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mux service unavailable at {path}: {source}")]
    ServiceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("discovery exchange timed out after {0:?}")]
    Timeout(Duration),

    #[error("discovery exchange failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("malformed discovery reply: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("mux service closed the control socket without replying")]
    NoReply,

    #[error("expected a discovery reply, got {0:?}")]
    UnexpectedReply(MessageType),

    #[error("mux service refused session {0}")]
    Refused(SessionId),

    #[error("unusable channel address {0:?}")]
    BadAddress(String),

    #[error("cannot read auth file {path}: {source}")]
    AuthFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("auth file {0} is empty")]
    EmptyAuthFile(PathBuf),
}

/// One discovery round trip with the mux service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryExchange: Send + Sync {
    /// Sends `request` and returns the raw channel address from the reply.
    /// An empty address means the service refused the session.
    async fn request(&self, request: DiscoveryRequestMessage) -> Result<String, DiscoveryError>;
}

/// Where a resolved session lives and how it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub address: ChannelAddress,
    pub auth_token: Option<String>,
}

/// Resolves the channel address for `session_id` with the mux service
/// named `service_name`.
///
/// The service name travels in the request so a service answering on a
/// shared control socket can tell its requests apart.  When `auth_file` is given, its trimmed contents become the auth token,
/// sent with the request and kept for the channel handshake.
///
/// # Errors
///
/// [`DiscoveryError`] when the auth file is unusable, the exchange fails, or
/// the reply carries no usable address.
pub async fn resolve(
    exchange: &dyn DiscoveryExchange,
    service_name: &str,
    object_path: &str,
    session_id: SessionId,
    port: Option<u16>,
    auth_file: Option<&Path>,
) -> Result<ResolvedSession, DiscoveryError> {
    let auth_token = match auth_file {
        Some(path) => Some(read_auth_token(path).await?),
        None => None,
    };

    let request = DiscoveryRequestMessage {
        service_name: service_name.to_string(),
        object_path: object_path.to_string(),
        session_id: session_id.get(),
        port,
        auth_token: auth_token.clone(),
    };
    debug!(
        "discovery request to {service_name} for {object_path} session {session_id} port {port:?}"
    );

    let raw = exchange.request(request).await?;
    if raw.trim().is_empty() {
        return Err(DiscoveryError::Refused(session_id));
    }
    let address = ChannelAddress::parse(&raw).ok_or(DiscoveryError::BadAddress(raw))?;
    info!("session {session_id} resolved to {address}");

    Ok(ResolvedSession {
        address,
        auth_token,
    })
}

async fn read_auth_token(path: &Path) -> Result<String, DiscoveryError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DiscoveryError::AuthFile {
            path: path.to_path_buf(),
            source,
        })?;
    let token = contents.trim();
    if token.is_empty() {
        return Err(DiscoveryError::EmptyAuthFile(path.to_path_buf()));
    }
    Ok(token.to_string())
}

// ── Control socket exchange ───────────────────────────────────────────────────

/// Discovery over the mux service's Unix control socket.
pub struct ControlSocketExchange {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ControlSocketExchange {
    pub fn new(socket_path: PathBuf, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    async fn round_trip(&self, request: DiscoveryRequestMessage) -> Result<String, DiscoveryError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| DiscoveryError::ServiceUnavailable {
                path: self.socket_path.clone(),
                source,
            })?;
        let (read, write) = stream.into_split();
        let mut writer = FrameWriter::new(write);
        let mut reader = FrameReader::new(read);

        writer.send(&MuxMessage::DiscoveryRequest(request)).await?;

        match reader.next_frame().await? {
            Some(Ok(MuxMessage::DiscoveryReply(reply))) => Ok(reply.address),
            Some(Ok(other)) => Err(DiscoveryError::UnexpectedReply(other.message_type())),
            Some(Err(e)) => Err(DiscoveryError::Protocol(e)),
            None => Err(DiscoveryError::NoReply),
        }
    }
}

#[async_trait]
impl DiscoveryExchange for ControlSocketExchange {
    async fn request(&self, request: DiscoveryRequestMessage) -> Result<String, DiscoveryError> {
        tokio::time::timeout(self.timeout, self.round_trip(request))
            .await
            .map_err(|_| DiscoveryError::Timeout(self.timeout))?
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
