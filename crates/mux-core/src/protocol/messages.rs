//! All mux bridge protocol message types.
//!
//! The same framing carries three conversations:
//!
//! - **Discovery** – the bridge asks the mux service for a per-session
//!   channel address (`DiscoveryRequest` / `DiscoveryReply`).
//! - **Display** – the bridge tells the mux which framebuffer regions changed
//!   (`Hello`, `DamageRegion`, `SurfaceChanged`, `Goodbye`).
//! - **Input** – the mux sends raw pointer and keyboard messages plus its
//!   observed frame rate back to the bridge (`MouseInput`, `KeyboardInput`,
//!   `RefreshRateReport`).
//!
//! Input flag fields are carried verbatim; interpreting them is the job of
//! [`crate::domain::input`].

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a peer may declare.  Anything larger means the stream is
/// out of sync.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Discovery (0x00–0x0F)
    DiscoveryRequest = 0x01,
    DiscoveryReply = 0x02,
    Hello = 0x03,
    // Display, bridge → mux (0x10–0x1F)
    DamageRegion = 0x10,
    SurfaceChanged = 0x11,
    // Timing, mux → bridge (0x20–0x2F)
    RefreshRateReport = 0x20,
    // Input, mux → bridge (0x40–0x4F)
    MouseInput = 0x40,
    KeyboardInput = 0x41,
    // Session end
    Goodbye = 0x7F,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::DiscoveryRequest),
            0x02 => Ok(MessageType::DiscoveryReply),
            0x03 => Ok(MessageType::Hello),
            0x10 => Ok(MessageType::DamageRegion),
            0x11 => Ok(MessageType::SurfaceChanged),
            0x20 => Ok(MessageType::RefreshRateReport),
            0x40 => Ok(MessageType::MouseInput),
            0x41 => Ok(MessageType::KeyboardInput),
            0x7F => Ok(MessageType::Goodbye),
            _ => Err(()),
        }
    }
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// DISCOVERY_REQUEST (0x01): asks the mux service for a session channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequestMessage {
    /// Name of the mux service the request is addressed to.
    pub service_name: String,
    /// Object path of the display object being bridged.
    pub object_path: String,
    /// Random id distinguishing this bridge instance.
    pub session_id: u32,
    /// TCP port requested for the session (later protocol revision).
    pub port: Option<u16>,
    /// Credential read from the configured auth file.
    pub auth_token: Option<String>,
}

/// DISCOVERY_REPLY (0x02): the address the bridge should connect to.
///
/// An empty address means the service refused the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReplyMessage {
    pub address: String,
}

/// HELLO (0x03): first frame on a freshly opened session channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    pub session_id: u32,
    pub auth_token: Option<String>,
}

/// DAMAGE_REGION (0x10): a rectangle of the framebuffer changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRegionMessage {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// SURFACE_CHANGED (0x11): the console switched to a new surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceChangedMessage {
    pub width: u32,
    pub height: u32,
}

/// REFRESH_RATE_REPORT (0x20): the mux's preferred refresh interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRateReportMessage {
    pub rate: u32,
}

/// MOUSE_INPUT (0x40): raw pointer message; `flags` selects move vs. button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseInputMessage {
    pub x: u32,
    pub y: u32,
    pub flags: u32,
}

/// KEYBOARD_INPUT (0x41): raw keyboard message; `flags` selects down vs. up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardInputMessage {
    pub keycode: u32,
    pub flags: u32,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid mux bridge messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuxMessage {
    DiscoveryRequest(DiscoveryRequestMessage),
    DiscoveryReply(DiscoveryReplyMessage),
    Hello(HelloMessage),
    DamageRegion(DamageRegionMessage),
    SurfaceChanged(SurfaceChangedMessage),
    RefreshRateReport(RefreshRateReportMessage),
    MouseInput(MouseInputMessage),
    KeyboardInput(KeyboardInputMessage),
    Goodbye,
}

impl MuxMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            MuxMessage::DiscoveryRequest(_) => MessageType::DiscoveryRequest,
            MuxMessage::DiscoveryReply(_) => MessageType::DiscoveryReply,
            MuxMessage::Hello(_) => MessageType::Hello,
            MuxMessage::DamageRegion(_) => MessageType::DamageRegion,
            MuxMessage::SurfaceChanged(_) => MessageType::SurfaceChanged,
            MuxMessage::RefreshRateReport(_) => MessageType::RefreshRateReport,
            MuxMessage::MouseInput(_) => MessageType::MouseInput,
            MuxMessage::KeyboardInput(_) => MessageType::KeyboardInput,
            MuxMessage::Goodbye => MessageType::Goodbye,
        }
    }

    /// Builds a damage-region message from its four components.
    pub fn damage(x: i32, y: i32, w: i32, h: i32) -> Self {
        MuxMessage::DamageRegion(DamageRegionMessage { x, y, w, h })
    }
}
