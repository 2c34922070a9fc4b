//! Integration tests for the mux-core protocol codec and input decoding.
//!
//! These run the public API the way the bridge's inbound loop does: frames
//! arrive concatenated in one buffer, are split with `frame_length`, decoded,
//! and the input messages are turned into events.

use mux_core::{
    decode_keyboard, decode_message, decode_mouse, encode_message, frame_length,
    protocol::messages::{
        DiscoveryReplyMessage, HelloMessage, KeyboardInputMessage, MouseInputMessage,
        RefreshRateReportMessage, SurfaceChangedMessage,
    },
    DecodeError, DisplaySurface, InputEvent, MuxMessage, PixelFormat, PointerButton,
    ProtocolError,
};

fn roundtrip(msg: MuxMessage) -> MuxMessage {
    let bytes = encode_message(&msg).expect("encode must succeed");
    let (decoded, consumed) = decode_message(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

#[test]
fn test_roundtrip_hello_with_token() {
    let original = MuxMessage::Hello(HelloMessage {
        session_id: 12345,
        auth_token: Some("token".to_string()),
    });
    assert_eq!(original, roundtrip(original.clone()));
}

#[test]
fn test_roundtrip_surface_changed() {
    let original = MuxMessage::SurfaceChanged(SurfaceChangedMessage {
        width: 1920,
        height: 1080,
    });
    assert_eq!(original, roundtrip(original.clone()));
}

#[test]
fn test_roundtrip_discovery_reply() {
    let original = MuxMessage::DiscoveryReply(DiscoveryReplyMessage {
        address: "/run/mux/42.sock".to_string(),
    });
    assert_eq!(original, roundtrip(original.clone()));
}

#[test]
fn test_stream_with_garbage_frame_in_the_middle_can_be_resynchronised() {
    // Arrange: valid, unknown-type, valid
    let first = MuxMessage::KeyboardInput(KeyboardInputMessage {
        keycode: 0x1E,
        flags: 0x4000,
    });
    let last = MuxMessage::RefreshRateReport(RefreshRateReportMessage { rate: 16 });
    let mut buf = encode_message(&first).unwrap();
    buf.extend_from_slice(&[0x01, 0xEE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    buf.extend_from_slice(&encode_message(&last).unwrap());

    // Act: walk the buffer frame by frame, skipping what does not decode
    let mut decoded = Vec::new();
    let mut errors = Vec::new();
    let mut rest = &buf[..];
    while !rest.is_empty() {
        let len = frame_length(rest).unwrap();
        match decode_message(&rest[..len]) {
            Ok((msg, _)) => decoded.push(msg),
            Err(e) => errors.push(e),
        }
        rest = &rest[len..];
    }

    // Assert
    assert_eq!(decoded, vec![first, last]);
    assert_eq!(errors, vec![ProtocolError::UnknownMessageType(0xEE)]);
}

#[test]
fn test_decoded_wire_input_becomes_events() {
    let surface = DisplaySurface::new(800, 600, PixelFormat::X8R8G8B8);

    let click = MouseInputMessage {
        x: 0,
        y: 0,
        flags: 0xA000,
    };
    assert_eq!(
        decode_mouse(&click, Some(&surface)),
        Ok(InputEvent::PointerButton {
            button: PointerButton::Right,
            pressed: true
        })
    );

    let bogus = KeyboardInputMessage {
        keycode: 0x10,
        flags: 0x1234,
    };
    assert!(matches!(
        decode_keyboard(&bogus),
        Err(DecodeError::InvalidKeyboardFlags { .. })
    ));
}
