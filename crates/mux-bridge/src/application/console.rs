//! The hypervisor console, as a capability the bridge is handed.
//!
//! The bridge never owns pixel storage, framebuffer diffing or the input
//! queue.  It reaches them only through [`Console`], and the console reaches
//! the bridge only through the [`DisplayListener`] it registers.  Concrete
//! consoles live in the infrastructure layer.

use std::sync::Arc;

use mux_core::{DisplaySurface, PixelFormat, PointerButton};

/// Absolute pointer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAxis {
    X,
    Y,
}

/// Keys the console can inject by symbolic name rather than scan code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyName {
    LeftMeta,
}

/// Console lifecycle notifications that end the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownReason {
    ProcessExit,
    PowerDown,
}

/// Callback run once when a [`TeardownReason`] fires.
pub type TeardownHook = Box<dyn Fn() + Send + Sync>;

/// Display callbacks the console invokes on its own rendering thread.
///
/// Implementations must return promptly: no blocking I/O in any callback.
pub trait DisplayListener: Send + Sync {
    /// A rectangle of the framebuffer changed.
    fn on_update(&self, x: i32, y: i32, w: i32, h: i32);

    /// The console replaced its surface.
    fn on_switch(&self, surface: Arc<DisplaySurface>);

    /// A rectangle was copied within the framebuffer.
    fn on_copy(&self, src_x: i32, src_y: i32, dst_x: i32, dst_y: i32, w: i32, h: i32);

    /// Periodic refresh tick.
    fn on_refresh(&self);

    /// Whether the listener can consume surfaces in `format` directly.
    fn check_format(&self, format: PixelFormat) -> bool;

    /// Guest cursor position changed.
    fn on_mouse_set(&self, _x: i32, _y: i32, _visible: bool) {}

    /// Guest cursor shape changed.
    fn on_cursor_define(&self, _width: u32, _height: u32) {}
}

/// Capabilities the bridge consumes from the hypervisor console.
pub trait Console: Send + Sync {
    /// Starts delivering display callbacks to `listener`.
    fn register_listener(&self, listener: Arc<dyn DisplayListener>);

    /// Stops delivering display callbacks.  No-op when none is registered.
    fn unregister_listener(&self);

    /// Materializes the latest framebuffer contents, reporting damage through
    /// the registered listener.
    fn update_framebuffer(&self);

    /// Sets the console's display refresh interval in milliseconds.
    fn set_update_interval(&self, interval_ms: u32);

    /// Queues an absolute axis value, already scaled to the console's range.
    fn queue_abs(&self, axis: InputAxis, value: u32);

    fn queue_button(&self, button: PointerButton, pressed: bool);

    /// Flushes queued pointer events to the guest.
    fn sync_input(&self);

    fn send_key_number(&self, keycode: u32, pressed: bool);

    fn send_key_name(&self, key: KeyName, pressed: bool);

    /// Schedules a key delay; `0` means no artificial delay.
    fn send_key_delay(&self, delay_ms: u32);

    /// Registers `hook` to run when `reason` fires.
    fn add_teardown_notifier(&self, reason: TeardownReason, hook: TeardownHook);
}
