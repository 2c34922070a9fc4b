//! mux-bridge: runs one bridge session against a mux service.
//!
//! The binary drives a headless console (a fixed-size surface with no guest
//! behind it), which is enough to exercise discovery, the handshake, the
//! three loops and teardown against a real mux.
//!
//! # Usage
//!
//! ```text
//! mux-bridge [OPTIONS]
//!
//! Options:
//!   --config       <FILE>  TOML config file
//!   --service-name <NAME>  mux service name
//!   --object-path  <PATH>  object path of this display
//!   --port         <PORT>  request a TCP session channel
//!   --auth-file    <FILE>  file holding the session auth token
//!   --runtime-dir  <DIR>   directory of the service's control socket
//!   --width        <PX>    headless surface width
//!   --height       <PX>    headless surface height
//! ```
//!
//! CLI values override the config file, which overrides the defaults.  The
//! log level comes from `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mux_bridge::application::console::{Console, TeardownReason};
use mux_bridge::domain::BridgeConfig;
use mux_bridge::infrastructure::console::HeadlessConsole;
use mux_bridge::infrastructure::{ControlSocketExchange, MuxBridge};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "mux-bridge",
    about = "Bridges a VM graphical console to a remote display mux",
    version
)]
struct Cli {
    /// TOML config file.  Missing fields take their defaults.
    #[arg(long, env = "MUX_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MUX_SERVICE_NAME")]
    service_name: Option<String>,

    #[arg(long, env = "MUX_OBJECT_PATH")]
    object_path: Option<String>,

    /// Ask the service for a TCP session channel on this port.
    #[arg(long, env = "MUX_PORT")]
    port: Option<u16>,

    #[arg(long, env = "MUX_AUTH_FILE")]
    auth_file: Option<PathBuf>,

    #[arg(long, env = "MUX_RUNTIME_DIR")]
    runtime_dir: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,
}

impl Cli {
    /// Layers the CLI values over the config file (or the defaults).
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("cannot load config {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(service_name) = self.service_name {
            config.service_name = service_name;
        }
        if let Some(object_path) = self.object_path {
            config.object_path = object_path;
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if self.auth_file.is_some() {
            config.auth_file = self.auth_file;
        }
        if let Some(runtime_dir) = self.runtime_dir {
            config.runtime_dir = runtime_dir;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }

        config.validate().context("invalid bridge configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_bridge_config()?;
    info!(
        "mux-bridge starting: service={} object={} control={}",
        config.service_name,
        config.object_path,
        config.control_socket_path().display()
    );

    let console = Arc::new(HeadlessConsole::new(
        config.width,
        config.height,
        config.initial_refresh_ms,
    ));
    let exchange =
        ControlSocketExchange::new(config.control_socket_path(), config.connect_timeout());
    let bridge = MuxBridge::new(config, Arc::clone(&console) as Arc<dyn Console>);

    bridge
        .start(&exchange)
        .await
        .context("bridge startup failed")?;
    info!("bridge status: {:?}", bridge.status());

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => error!("failed to listen for Ctrl+C: {e}"),
    }
    console.notify(TeardownReason::ProcessExit);
    bridge.join().await;

    info!("mux-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_uses_defaults() {
        // Arrange
        let cli = Cli::parse_from(["mux-bridge"]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert
        let defaults = BridgeConfig::default();
        assert_eq!(config.service_name, defaults.service_name);
        assert_eq!(config.width, 1024);
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_cli_overrides_identity_and_port() {
        let cli = Cli::parse_from([
            "mux-bridge",
            "--service-name",
            "org.mux.Test",
            "--object-path",
            "/vm/7",
            "--port",
            "5907",
        ]);

        let config = cli.into_bridge_config().unwrap();

        assert_eq!(config.service_name, "org.mux.Test");
        assert_eq!(config.object_path, "/vm/7");
        assert_eq!(config.port, Some(5907));
    }

    #[test]
    fn test_cli_overrides_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("mux-bridge-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "service_name = \"from.file\"\nwidth = 800\n").unwrap();
        let cli = Cli::parse_from([
            "mux-bridge",
            "--config",
            path.to_str().unwrap(),
            "--width",
            "1280",
        ]);

        // Act
        let config = cli.into_bridge_config().unwrap();

        // Assert: file value kept where the CLI is silent
        assert_eq!(config.service_name, "from.file");
        assert_eq!(config.width, 1280);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["mux-bridge", "--config", "/nonexistent/mux.toml"]);
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_empty_service_name_is_rejected() {
        let cli = Cli::parse_from(["mux-bridge", "--service-name", ""]);
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_invalid_port_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["mux-bridge", "--port", "70000"]);
        assert!(result.is_err());
    }
}
