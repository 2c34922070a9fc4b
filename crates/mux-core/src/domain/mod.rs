//! Domain entities for the mux bridge.
//!
//! This module contains pure logic with no infrastructure dependencies: no
//! sockets, no threads, no console bindings.  Everything here can be tested
//! in isolation.

/// Raw mux input messages → abstract input events.
pub mod input;
/// Refresh-interval negotiation policy.
pub mod refresh;
/// Session ids, lifecycle states and channel addresses.
pub mod session;
/// Surface geometry and pixel formats.
pub mod surface;
