//! Bridge configuration.
//!
//! [`BridgeConfig`] is the already-resolved configuration record the bridge
//! starts from.  It can come from a TOML file, from CLI arguments layered on
//! top of that file, or from [`Default`] in tests.
//!
//! ```toml
//! service_name = "org.mux.Display"
//! object_path = "/org/mux/Display/vm0"
//! port = 5901
//! auth_file = "/etc/mux/vm0.token"
//! connect_timeout_ms = 5000
//! ```
//!
//! Every field carries a serde default, so a partial file (or an empty one)
//! is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mux_core::domain::refresh::DEFAULT_INTERVAL_MS;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// All runtime settings for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the mux service that hands out session channels.
    pub service_name: String,
    /// Object path identifying this VM's display to the mux service.
    pub object_path: String,
    /// Requested TCP port for the session channel, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// File whose trimmed contents are the session's auth token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_file: Option<PathBuf>,
    /// Directory holding the mux service's control socket.
    pub runtime_dir: PathBuf,
    pub connect_timeout_ms: u64,
    /// Refresh interval (ms) the console starts with.
    pub initial_refresh_ms: u32,
    /// Surface geometry of the bundled headless console.
    pub width: u32,
    pub height: u32,
}

fn default_runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            service_name: "org.mux.Display".to_string(),
            object_path: "/org/mux/Display".to_string(),
            port: None,
            auth_file: None,
            runtime_dir: default_runtime_dir(),
            connect_timeout_ms: 5000,
            initial_refresh_ms: DEFAULT_INTERVAL_MS,
            width: 1024,
            height: 768,
        }
    }
}

impl BridgeConfig {
    /// Parses a config from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// for malformed TOML, [`ConfigError::Invalid`] for empty identifiers.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name is empty".into()));
        }
        if self.object_path.trim().is_empty() {
            return Err(ConfigError::Invalid("object_path is empty".into()));
        }
        if self.initial_refresh_ms == 0 {
            return Err(ConfigError::Invalid("initial_refresh_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Path of the mux service's control socket: `<runtime_dir>/<service_name>.sock`.
    pub fn control_socket_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.sock", self.service_name))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_and_geometry() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.initial_refresh_ms, 30);
        assert_eq!((cfg.width, cfg.height), (1024, 768));
        assert_eq!(cfg.port, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults_for_missing_fields() {
        // Arrange
        let text = r#"
            service_name = "mux.test"
            port = 5901
        "#;

        // Act
        let cfg = BridgeConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.service_name, "mux.test");
        assert_eq!(cfg.port, Some(5901));
        assert_eq!(cfg.object_path, BridgeConfig::default().object_path);
        assert_eq!(cfg.connect_timeout_ms, 5000);
    }

    #[test]
    fn test_empty_toml_is_valid() {
        assert!(BridgeConfig::from_toml_str("").is_ok());
    }

    #[test]
    fn test_empty_service_name_is_rejected() {
        let result = BridgeConfig::from_toml_str(r#"service_name = "  ""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_initial_refresh_is_rejected() {
        let result = BridgeConfig::from_toml_str("initial_refresh_ms = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = BridgeConfig::from_toml_str("port = \"not a number\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = BridgeConfig::load(Path::new("/nonexistent/mux-bridge.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_control_socket_path_joins_runtime_dir_and_service() {
        let cfg = BridgeConfig {
            runtime_dir: PathBuf::from("/run/user/1000"),
            service_name: "org.mux.Display".into(),
            ..BridgeConfig::default()
        };
        assert_eq!(
            cfg.control_socket_path(),
            PathBuf::from("/run/user/1000/org.mux.Display.sock")
        );
    }
}
