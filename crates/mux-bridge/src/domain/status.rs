//! Read-only bridge status, as reported to external tooling.

use std::path::PathBuf;

use serde::Serialize;

use mux_core::BridgeState;

/// Which of the three bridge loops are still running.
///
/// A loop that hit a channel error exits on its own; the others keep going.
/// This is how a degraded bridge shows up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatus {
    pub inbound: bool,
    pub outbound: bool,
    pub periodic: bool,
}

impl LoopStatus {
    pub fn all_running(&self) -> bool {
        self.inbound && self.outbound && self.periodic
    }
}

/// Snapshot returned by the status query.
///
/// `enabled` is `true` only while a session is active.  The identifying
/// fields are only filled in when it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub enabled: bool,
    pub state: BridgeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_file: Option<PathBuf>,
    pub loops: LoopStatus,
}

impl BridgeStatus {
    /// Status of a bridge with no active session.
    pub fn disabled(state: BridgeState) -> Self {
        Self {
            enabled: false,
            state,
            service_name: None,
            object_path: None,
            port: None,
            auth_file: None,
            loops: LoopStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_status_carries_no_identity() {
        let status = BridgeStatus::disabled(BridgeState::Closed);
        assert!(!status.enabled);
        assert_eq!(status.service_name, None);
        assert!(!status.loops.inbound && !status.loops.outbound && !status.loops.periodic);
    }

    #[test]
    fn test_all_running_requires_every_loop() {
        let mut loops = LoopStatus {
            inbound: true,
            outbound: true,
            periodic: true,
        };
        assert!(loops.all_running());
        loops.outbound = false;
        assert!(!loops.all_running());
    }
}
