//! Application layer: the console contract and the use cases that drive it.
//!
//! Depends on `domain` and `mux-core`; the only runtime piece it touches is
//! the outbound queue sender.

pub mod console;
pub mod display_bridge;
pub mod inbound;
pub mod inject_input;
pub mod refresh;

pub use console::{Console, DisplayListener, InputAxis, KeyName, TeardownHook, TeardownReason};
pub use display_bridge::{DisplayBridge, SurfaceSlot};
pub use inbound::{InboundError, InboundHandler};
pub use inject_input::InputInjector;
pub use refresh::RefreshNegotiator;
