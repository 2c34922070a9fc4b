//! Infrastructure layer: everything that touches sockets, tasks or the
//! concrete console.
//!
//! # Responsibilities
//!
//! - Discovering the session channel through the mux service's control socket
//! - Opening the channel and exchanging framed messages over it
//! - Running the inbound, outbound and periodic loops
//! - Supervising startup, status and teardown
//!
//! # What does NOT belong here?
//!
//! - Input decoding and refresh policy (that is `mux-core`)
//! - Mapping console callbacks to messages (that is the application layer)

pub mod channel;
pub mod console;
pub mod discovery;
pub mod loops;
pub mod supervisor;

pub use channel::{BridgeSession, ChannelError, ConnectionError, SessionChannel};
pub use discovery::{resolve, ControlSocketExchange, DiscoveryError, DiscoveryExchange};
pub use supervisor::{MuxBridge, StartupError};
