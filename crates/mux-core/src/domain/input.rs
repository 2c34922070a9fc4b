//! Input codec: raw mux pointer/keyboard messages → abstract input events.
//!
//! The flag values below are defined by the remote mux endpoint, not by this
//! crate.  They are a compatibility contract and are matched by exact value;
//! none of them are bit-tested.
//!
//! # Pointer messages
//!
//! | flags    | meaning               |
//! |----------|-----------------------|
//! | `0x0800` | absolute move         |
//! | `0x9000` | left button down      |
//! | `0x1000` | left button up        |
//! | `0xA000` | right button down     |
//! | `0x2000` | right button up       |
//! | `0xC000` | middle button down    |
//! | `0x4000` | middle button up      |
//!
//! # Keyboard messages
//!
//! `0x4000`/`0x4100` press a key, `0x8000`/`0x8100` release it.  Scan codes
//! `0x5B` and `0x5C` (left and right platform meta) both map to a single
//! logical left-meta key.
//!
//! Decoding is pure: the only outside state consulted is the current surface
//! geometry, used to scale absolute pointer positions.

use thiserror::Error;

use crate::domain::surface::DisplaySurface;
use crate::protocol::messages::{KeyboardInputMessage, MouseInputMessage};

// ── Wire flag constants ───────────────────────────────────────────────────────

/// Pointer flag values.
pub mod mouse_flags {
    pub const MOVE: u32 = 0x0800;
    pub const LEFT_DOWN: u32 = 0x9000;
    pub const LEFT_UP: u32 = 0x1000;
    pub const RIGHT_DOWN: u32 = 0xA000;
    pub const RIGHT_UP: u32 = 0x2000;
    pub const MIDDLE_DOWN: u32 = 0xC000;
    pub const MIDDLE_UP: u32 = 0x4000;
}

/// Keyboard flag values.
pub mod key_flags {
    pub const DOWN: u32 = 0x4000;
    pub const DOWN_EXTENDED: u32 = 0x4100;
    pub const UP: u32 = 0x8000;
    pub const UP_EXTENDED: u32 = 0x8100;
}

/// Left platform-meta scan code.
pub const LEFT_META_KEYCODE: u32 = 0x5B;
/// Right platform-meta scan code; collapses to [`LEFT_META_KEYCODE`].
pub const RIGHT_META_KEYCODE: u32 = 0x5C;

/// Upper bound of the console's absolute pointer axis.
pub const INPUT_ABS_MAX: u32 = 0x7FFF;

// ── Decoded events ────────────────────────────────────────────────────────────

/// Pointer buttons the mux can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// A decoded input event, ready for the console input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Absolute pointer position, already scaled to `0..=INPUT_ABS_MAX`.
    PointerMove { x: u32, y: u32 },
    PointerButton { button: PointerButton, pressed: bool },
    /// Key press or release.  When `is_meta` is set, `keycode` is always
    /// [`LEFT_META_KEYCODE`].
    KeyEvent { keycode: u32, pressed: bool, is_meta: bool },
}

/// Why a wire message produced no event.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid mouse button input: 0x{0:X}")]
    InvalidMouseFlags(u32),

    #[error("unknown keyboard message flags 0x{flags:X} for keycode 0x{keycode:X}")]
    InvalidKeyboardFlags { keycode: u32, flags: u32 },

    /// A pointer move arrived before the console provided any surface.
    #[error("pointer move received with no active surface")]
    NoSurface,
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes a pointer message.
///
/// # Errors
///
/// - [`DecodeError::NoSurface`] for a move when `surface` is `None`.
/// - [`DecodeError::InvalidMouseFlags`] for any flag outside the table.
pub fn decode_mouse(
    msg: &MouseInputMessage,
    surface: Option<&DisplaySurface>,
) -> Result<InputEvent, DecodeError> {
    if msg.flags == mouse_flags::MOVE {
        let surface = surface.ok_or(DecodeError::NoSurface)?;
        return Ok(InputEvent::PointerMove {
            x: scale_axis(msg.x, surface.width),
            y: scale_axis(msg.y, surface.height),
        });
    }

    let (button, pressed) = match msg.flags {
        mouse_flags::LEFT_DOWN => (PointerButton::Left, true),
        mouse_flags::LEFT_UP => (PointerButton::Left, false),
        mouse_flags::RIGHT_DOWN => (PointerButton::Right, true),
        mouse_flags::RIGHT_UP => (PointerButton::Right, false),
        mouse_flags::MIDDLE_DOWN => (PointerButton::Middle, true),
        mouse_flags::MIDDLE_UP => (PointerButton::Middle, false),
        other => return Err(DecodeError::InvalidMouseFlags(other)),
    };
    Ok(InputEvent::PointerButton { button, pressed })
}

/// Decodes a keyboard message.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidKeyboardFlags`] for any flag outside the
/// down/up sets.
pub fn decode_keyboard(msg: &KeyboardInputMessage) -> Result<InputEvent, DecodeError> {
    let pressed = match msg.flags {
        key_flags::DOWN | key_flags::DOWN_EXTENDED => true,
        key_flags::UP | key_flags::UP_EXTENDED => false,
        flags => {
            return Err(DecodeError::InvalidKeyboardFlags {
                keycode: msg.keycode,
                flags,
            })
        }
    };

    let is_meta = matches!(msg.keycode, LEFT_META_KEYCODE | RIGHT_META_KEYCODE);
    Ok(InputEvent::KeyEvent {
        keycode: if is_meta { LEFT_META_KEYCODE } else { msg.keycode },
        pressed,
        is_meta,
    })
}

/// Scales a pixel coordinate on an axis of `size` pixels into the console's
/// absolute axis range.
///
/// Mirrors the console convention: `value * INPUT_ABS_MAX / (size - 1)`, the
/// midpoint for degenerate axes, clamped to [`INPUT_ABS_MAX`].
pub fn scale_axis(value: u32, size: u32) -> u32 {
    if size <= 1 {
        return INPUT_ABS_MAX / 2;
    }
    let scaled = u64::from(value) * u64::from(INPUT_ABS_MAX) / u64::from(size - 1);
    scaled.min(u64::from(INPUT_ABS_MAX)) as u32
}

// ── Tests ─────────────────────────────────────────────────────────────────────
