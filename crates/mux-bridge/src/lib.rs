//! mux-bridge library crate.
//!
//! Bridges a virtual machine's graphical console to a remote display mux:
//! framebuffer damage goes out, pointer and keyboard input comes back in.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Hypervisor console (Console / DisplayListener)
//!         ↕
//! [mux-bridge]
//!   ├── domain/           BridgeConfig, BridgeStatus
//!   ├── application/      Display bridge, input injection, refresh negotiation
//!   └── infrastructure/
//!         ├── discovery/  Control-socket session discovery
//!         ├── channel/    Session channel, framed reader/writer
//!         ├── loops/      Inbound, outbound and periodic loops
//!         └── supervisor/ Startup, status, teardown
//!         ↕
//! Remote mux (mux-core frames over a Unix or TCP socket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O beyond reading the config file.
//! - `application` depends on `domain`, `mux-core` and tokio's queue sender.
//! - `infrastructure` depends on all other layers plus `tokio`.

/// Domain layer: configuration and status types.
pub mod domain;

/// Application layer: console contract and use cases.
pub mod application;

/// Infrastructure layer: discovery, channel, loops and supervisor.
pub mod infrastructure;
