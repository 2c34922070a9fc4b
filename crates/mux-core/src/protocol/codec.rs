//! Binary codec for encoding and decoding mux bridge protocol frames.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. All multi-byte integers are big-endian.
//!
//! Optional fields are a presence byte (`0x00`/`0x01`) followed by the value.
//! Strings are a 2-byte length prefix followed by UTF-8 bytes.

use crate::protocol::messages::{
    DamageRegionMessage, DiscoveryReplyMessage, DiscoveryRequestMessage, HelloMessage,
    KeyboardInputMessage, MessageType, MouseInputMessage, MuxMessage, RefreshRateReportMessage,
    SurfaceChangedMessage, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION,
};
use thiserror::Error;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice does not yet hold a complete frame.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field value out of range, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The header declares a payload larger than [`MAX_PAYLOAD_SIZE`].
    #[error("payload of {declared} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { declared: usize, max: usize },
}

impl ProtocolError {
    /// Returns `true` when the error only means "wait for more bytes".
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::InsufficientData { .. })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`MuxMessage`] into a byte vector including the 8-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the payload would not fit
/// the frame limit, or [`ProtocolError::MalformedPayload`] if a string field
/// is longer than its 16-bit length prefix can describe.
///
/// # Examples
///
/// ```rust
/// use mux_core::protocol::{decode_message, encode_message};
/// use mux_core::protocol::messages::MuxMessage;
///
/// let msg = MuxMessage::damage(0, 0, 640, 480);
/// let bytes = encode_message(&msg).unwrap();
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &MuxMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Returns the total length (header + payload) of the frame at the start of
/// `bytes`, using only the header.
///
/// This lets a stream reader discard a frame whose payload fails to decode
/// without losing its place in the stream.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if the header is incomplete.
/// - [`ProtocolError::PayloadTooLarge`] if the declared payload is over the limit.
pub fn frame_length(bytes: &[u8]) -> Result<usize, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(HEADER_SIZE + payload_len)
}

/// Decodes one [`MuxMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] while the frame is incomplete,
/// or another [`ProtocolError`] variant if the complete frame is invalid.
pub fn decode_message(bytes: &[u8]) -> Result<(MuxMessage, usize), ProtocolError> {
    let total = frame_length(bytes)?;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let msg_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let msg = decode_payload(msg_type, &bytes[HEADER_SIZE..total])?;
    Ok((msg, total))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &MuxMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        MuxMessage::DiscoveryRequest(m) => {
            write_length_prefixed_string(&mut buf, &m.service_name)?;
            write_length_prefixed_string(&mut buf, &m.object_path)?;
            buf.extend_from_slice(&m.session_id.to_be_bytes());
            match m.port {
                Some(port) => {
                    buf.push(0x01);
                    buf.extend_from_slice(&port.to_be_bytes());
                }
                None => buf.push(0x00),
            }
            write_optional_string(&mut buf, m.auth_token.as_deref())?;
        }
        MuxMessage::DiscoveryReply(m) => write_length_prefixed_string(&mut buf, &m.address)?,
        MuxMessage::Hello(m) => {
            buf.extend_from_slice(&m.session_id.to_be_bytes());
            write_optional_string(&mut buf, m.auth_token.as_deref())?;
        }
        MuxMessage::DamageRegion(m) => {
            for v in [m.x, m.y, m.w, m.h] {
                buf.extend_from_slice(&v.to_be_bytes());
            }
        }
        MuxMessage::SurfaceChanged(m) => {
            buf.extend_from_slice(&m.width.to_be_bytes());
            buf.extend_from_slice(&m.height.to_be_bytes());
        }
        MuxMessage::RefreshRateReport(m) => buf.extend_from_slice(&m.rate.to_be_bytes()),
        MuxMessage::MouseInput(m) => {
            for v in [m.x, m.y, m.flags] {
                buf.extend_from_slice(&v.to_be_bytes());
            }
        }
        MuxMessage::KeyboardInput(m) => {
            buf.extend_from_slice(&m.keycode.to_be_bytes());
            buf.extend_from_slice(&m.flags.to_be_bytes());
        }
        MuxMessage::Goodbye => {} // empty payload
    }
    Ok(buf)
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, p: &[u8]) -> Result<MuxMessage, ProtocolError> {
    match msg_type {
        MessageType::DiscoveryRequest => decode_discovery_request(p).map(MuxMessage::DiscoveryRequest),
        MessageType::DiscoveryReply => {
            let (address, _) = read_length_prefixed_string(p, 0)?;
            Ok(MuxMessage::DiscoveryReply(DiscoveryReplyMessage { address }))
        }
        MessageType::Hello => {
            require_len(p, 5, "Hello")?;
            let session_id = read_u32(p, 0)?;
            let (auth_token, _) = read_optional_string(p, 4)?;
            Ok(MuxMessage::Hello(HelloMessage { session_id, auth_token }))
        }
        MessageType::DamageRegion => {
            require_len(p, 16, "DamageRegion")?;
            Ok(MuxMessage::DamageRegion(DamageRegionMessage {
                x: read_u32(p, 0)? as i32,
                y: read_u32(p, 4)? as i32,
                w: read_u32(p, 8)? as i32,
                h: read_u32(p, 12)? as i32,
            }))
        }
        MessageType::SurfaceChanged => {
            require_len(p, 8, "SurfaceChanged")?;
            Ok(MuxMessage::SurfaceChanged(SurfaceChangedMessage {
                width: read_u32(p, 0)?,
                height: read_u32(p, 4)?,
            }))
        }
        MessageType::RefreshRateReport => {
            require_len(p, 4, "RefreshRateReport")?;
            Ok(MuxMessage::RefreshRateReport(RefreshRateReportMessage {
                rate: read_u32(p, 0)?,
            }))
        }
        MessageType::MouseInput => {
            require_len(p, 12, "MouseInput")?;
            Ok(MuxMessage::MouseInput(MouseInputMessage {
                x: read_u32(p, 0)?,
                y: read_u32(p, 4)?,
                flags: read_u32(p, 8)?,
            }))
        }
        MessageType::KeyboardInput => {
            require_len(p, 8, "KeyboardInput")?;
            Ok(MuxMessage::KeyboardInput(KeyboardInputMessage {
                keycode: read_u32(p, 0)?,
                flags: read_u32(p, 4)?,
            }))
        }
        MessageType::Goodbye => Ok(MuxMessage::Goodbye),
    }
}

fn decode_discovery_request(p: &[u8]) -> Result<DiscoveryRequestMessage, ProtocolError> {
    // 2 (name_len) + 2 (path_len) + 4 (session) + 1 (port flag) + 1 (token flag)
    require_len(p, 10, "DiscoveryRequest")?;
    let (service_name, name_end) = read_length_prefixed_string(p, 0)?;
    let (object_path, path_end) = read_length_prefixed_string(p, name_end)?;
    let session_id = read_u32(p, path_end)?;
    let mut off = path_end + 4;
    require_len(p, off + 1, "DiscoveryRequest.port")?;
    let port = match p[off] {
        0x00 => {
            off += 1;
            None
        }
        0x01 => {
            require_len(p, off + 3, "DiscoveryRequest.port")?;
            let port = u16::from_be_bytes([p[off + 1], p[off + 2]]);
            off += 3;
            Some(port)
        }
        other => {
            return Err(ProtocolError::MalformedPayload(format!(
                "invalid presence byte for port: {other}"
            )))
        }
    };
    let (auth_token, _) = read_optional_string(p, off)?;
    Ok(DiscoveryRequestMessage {
        service_name,
        object_path,
        session_id,
        port,
        auth_token,
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    if buf.len() < offset + 4 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 4 bytes at offset {offset}, got {}",
            buf.len().saturating_sub(offset)
        )));
    }
    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!(
            "string of {} bytes exceeds the {} byte field limit",
            s.len(),
            u16::MAX
        ))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_optional_string(buf: &mut Vec<u8>, s: Option<&str>) -> Result<(), ProtocolError> {
    match s {
        Some(s) => {
            buf.push(0x01);
            write_length_prefixed_string(buf, s)
        }
        None => {
            buf.push(0x00);
            Ok(())
        }
    }
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after the string.
fn read_length_prefixed_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if buf.len() < offset + 2 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 2 bytes for string length at offset {offset}"
        )));
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

fn read_optional_string(
    buf: &[u8],
    offset: usize,
) -> Result<(Option<String>, usize), ProtocolError> {
    require_len(buf, offset + 1, "optional string")?;
    match buf[offset] {
        0x00 => Ok((None, offset + 1)),
        0x01 => {
            let (s, end) = read_length_prefixed_string(buf, offset + 1)?;
            Ok((Some(s), end))
        }
        other => Err(ProtocolError::MalformedPayload(format!(
            "invalid presence byte for string: {other}"
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::*;

    fn round_trip(msg: &MuxMessage) -> MuxMessage {
        let encoded = encode_message(msg).expect("encode failed");
        let (decoded, consumed) = decode_message(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed bytes should equal total encoded size");
        decoded
    }

    #[test]
    fn test_discovery_request_with_port_and_token_round_trip() {
        let msg = MuxMessage::DiscoveryRequest(DiscoveryRequestMessage {
            service_name: "org.mux.Display".to_string(),
            object_path: "/org/mux/Display/0".to_string(),
            session_id: 0x7FFF_FFFE,
            port: Some(5900),
            auth_token: Some("s3cret".to_string()),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_discovery_request_without_optionals_round_trip() {
        let msg = MuxMessage::DiscoveryRequest(DiscoveryRequestMessage {
            service_name: String::new(),
            object_path: String::new(),
            session_id: 0,
            port: None,
            auth_token: None,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_damage_region_negative_origin_survives() {
        let msg = MuxMessage::damage(-4, -8, 16, 32);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_oversized_string_is_rejected_not_truncated() {
        // Arrange: one byte over the 16-bit length prefix, ending mid-character
        let mut address = "a".repeat(usize::from(u16::MAX) - 1);
        address.push('é');
        let msg = MuxMessage::DiscoveryReply(DiscoveryReplyMessage { address });

        // Act
        let result = encode_message(&msg);

        // Assert
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_multibyte_string_round_trips_whole() {
        let address = "é".repeat(1000);
        let msg = MuxMessage::DiscoveryReply(DiscoveryReplyMessage { address });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_goodbye_is_header_only() {
        let bytes = encode_message(&MuxMessage::Goodbye).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_message(&MuxMessage::RefreshRateReport(RefreshRateReportMessage {
            rate: 30,
        }))
        .unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(bytes[1], MessageType::RefreshRateReport as u8);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 4);
        assert_eq!(u32::from_be_bytes(bytes[8..12].try_into().unwrap()), 30);
    }

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        let result = decode_message(&[]);
        assert!(matches!(result, Err(ProtocolError::InsufficientData { .. })));
    }

    #[test]
    fn test_decode_partial_payload_returns_insufficient_data() {
        let bytes = encode_message(&MuxMessage::damage(1, 2, 3, 4)).unwrap();
        let result = decode_message(&bytes[..bytes.len() - 1]);
        assert!(result.unwrap_err().is_incomplete());
    }

    #[test]
    fn test_decode_unknown_message_type_returns_error() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0] = PROTOCOL_VERSION;
        bytes[1] = 0xEE;
        let result = decode_message(&bytes);
        assert_eq!(result, Err(ProtocolError::UnknownMessageType(0xEE)));
    }

    #[test]
    fn test_decode_wrong_version_returns_error() {
        let mut bytes = encode_message(&MuxMessage::Goodbye).unwrap();
        bytes[0] = 0x99;
        assert_eq!(decode_message(&bytes), Err(ProtocolError::UnsupportedVersion(0x99)));
    }

    #[test]
    fn test_decode_short_mouse_payload_is_malformed() {
        let mut bytes = vec![PROTOCOL_VERSION, MessageType::MouseInput as u8, 0, 0];
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_frame_length_reports_total_even_for_unknown_type() {
        let mut bytes = vec![PROTOCOL_VERSION, 0xEE, 0, 0];
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(frame_length(&bytes), Ok(HEADER_SIZE + 3));
    }

    #[test]
    fn test_frame_length_rejects_oversized_payload() {
        let mut bytes = vec![PROTOCOL_VERSION, MessageType::Hello as u8, 0, 0];
        bytes.extend_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            frame_length(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_presence_byte_is_malformed() {
        let mut bytes = vec![PROTOCOL_VERSION, MessageType::Hello as u8, 0, 0];
        bytes.extend_from_slice(&5u32.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 7, 0x05]);
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }
}
