//! # mux-core
//!
//! Shared library for the console mux bridge: the wire protocol codec, the
//! input codec, the refresh-interval policy and the session/surface types.
//!
//! It has no dependencies on sockets, threads, or the hypervisor console.
//!
//! # Architecture overview
//!
//! The bridge connects a virtual machine's graphical console to a remote
//! display-multiplexing process (the *mux*) over a local channel.  Frame
//! damage flows out to the mux; pointer and keyboard input flows back in.
//!
//! - **`protocol`** – How bytes travel over the channel.  Every frame is an
//!   8-byte header plus a typed payload.
//!
//! - **`domain`** – Pure logic: decoding the mux's input flag contract into
//!   [`InputEvent`]s, the [`RefreshPolicy`] that bounds the refresh cadence,
//!   and the session and surface value types.

pub mod domain;
pub mod protocol;

pub use domain::input::{decode_keyboard, decode_mouse, DecodeError, InputEvent, PointerButton};
pub use domain::refresh::RefreshPolicy;
pub use domain::session::{BridgeState, ChannelAddress, SessionId, SessionState};
pub use domain::surface::{DisplaySurface, PixelFormat, Rect};
pub use protocol::codec::{decode_message, encode_message, frame_length, ProtocolError};
pub use protocol::messages::MuxMessage;
