//! Domain layer: plain configuration and status types (no I/O beyond reading
//! the config file).

pub mod config;
pub mod status;

pub use config::{BridgeConfig, ConfigError};
pub use status::{BridgeStatus, LoopStatus};
