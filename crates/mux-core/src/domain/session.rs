//! Session identity, lifecycle states and channel addresses.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Random non-negative 31-bit id distinguishing concurrent bridge instances
/// during discovery.
///
/// Collisions are tolerated: a clash surfaces as a discovery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    /// Draws a fresh id uniformly from `0..i32::MAX`.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(0..i32::MAX as u32))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single channel to the mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unresolved,
    Connected,
    Closed,
}

/// Lifecycle of the whole bridge.
///
/// ```text
/// Idle → Resolving → Connecting → Running → Closed
///           └──────────┴──────────────────────↗ (failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BridgeState {
    Idle = 0,
    Resolving = 1,
    Connecting = 2,
    Running = 3,
    Closed = 4,
}

impl BridgeState {
    /// Decodes the value stored in an atomic state cell.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => BridgeState::Idle,
            1 => BridgeState::Resolving,
            2 => BridgeState::Connecting,
            3 => BridgeState::Running,
            _ => BridgeState::Closed,
        }
    }

    /// Returns `true` if `self → next` is a legal transition.
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Connecting)
                | (Resolving, Closed)
                | (Connecting, Running)
                | (Connecting, Closed)
                | (Running, Closed)
        )
    }
}

/// Where the session channel lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAddress {
    /// Local Unix domain socket.
    Unix(PathBuf),
    /// Loopback TCP endpoint, used when a port was negotiated.
    Tcp(SocketAddr),
}

impl ChannelAddress {
    const TCP_SCHEME: &'static str = "tcp://";

    /// Parses an address as returned by the mux service.
    ///
    /// `tcp://host:port` selects a TCP endpoint; any other non-empty string is
    /// a socket path.  Returns `None` for an empty or unparsable address.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix(Self::TCP_SCHEME) {
            Some(endpoint) => endpoint.parse().ok().map(ChannelAddress::Tcp),
            None => Some(ChannelAddress::Unix(PathBuf::from(raw))),
        }
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelAddress::Unix(path) => write!(f, "{}", path.display()),
            ChannelAddress::Tcp(addr) => write!(f, "{}{addr}", Self::TCP_SCHEME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_session_id_is_non_negative_31_bit() {
        for _ in 0..1000 {
            let id = SessionId::random();
            assert!(id.get() < i32::MAX as u32);
        }
    }

    #[test]
    fn test_bridge_state_round_trips_through_u8() {
        for state in [
            BridgeState::Idle,
            BridgeState::Resolving,
            BridgeState::Connecting,
            BridgeState::Running,
            BridgeState::Closed,
        ] {
            assert_eq!(BridgeState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_failed_startup_never_passes_through_running() {
        assert!(BridgeState::Resolving.can_transition_to(BridgeState::Closed));
        assert!(BridgeState::Connecting.can_transition_to(BridgeState::Closed));
        assert!(!BridgeState::Resolving.can_transition_to(BridgeState::Running));
        assert!(!BridgeState::Closed.can_transition_to(BridgeState::Running));
        assert!(!BridgeState::Idle.can_transition_to(BridgeState::Running));
    }

    #[test]
    fn test_parse_unix_path() {
        assert_eq!(
            ChannelAddress::parse("/run/mux/session-7.sock"),
            Some(ChannelAddress::Unix(PathBuf::from("/run/mux/session-7.sock")))
        );
    }

    #[test]
    fn test_parse_tcp_endpoint() {
        assert_eq!(
            ChannelAddress::parse("tcp://127.0.0.1:5901"),
            Some(ChannelAddress::Tcp("127.0.0.1:5901".parse().unwrap()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_tcp() {
        assert_eq!(ChannelAddress::parse("   "), None);
        assert_eq!(ChannelAddress::parse("tcp://nowhere"), None);
    }

    #[test]
    fn test_display_round_trips_tcp() {
        let addr = ChannelAddress::parse("tcp://127.0.0.1:7000").unwrap();
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:7000");
    }
}
