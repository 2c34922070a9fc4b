//! A console with no guest behind it.
//!
//! `HeadlessConsole` owns a fixed-size surface and accumulates damage posted
//! with [`HeadlessConsole::mark_dirty`].  It lets the `mux-bridge` binary run
//! a full session against a mux without a hypervisor attached: the surface is
//! announced on registration, pending damage is flushed on every framebuffer
//! update, and injected input is logged.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, trace};

use mux_core::{DisplaySurface, PixelFormat, PointerButton, Rect};

use crate::application::console::{
    Console, DisplayListener, InputAxis, KeyName, TeardownHook, TeardownReason,
};

pub struct HeadlessConsole {
    surface: Arc<DisplaySurface>,
    listener: Mutex<Option<Arc<dyn DisplayListener>>>,
    damage: Mutex<Vec<Rect>>,
    notifiers: Mutex<Vec<(TeardownReason, TeardownHook)>>,
    update_interval_ms: AtomicU32,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HeadlessConsole {
    pub fn new(width: u32, height: u32, initial_interval_ms: u32) -> Self {
        Self {
            surface: Arc::new(DisplaySurface::new(width, height, PixelFormat::X8R8G8B8)),
            listener: Mutex::new(None),
            damage: Mutex::new(Vec::new()),
            notifiers: Mutex::new(Vec::new()),
            update_interval_ms: AtomicU32::new(initial_interval_ms),
        }
    }

    pub fn surface(&self) -> Arc<DisplaySurface> {
        Arc::clone(&self.surface)
    }

    /// Records a damaged rectangle, reported on the next framebuffer update.
    pub fn mark_dirty(&self, rect: Rect) {
        locked(&self.damage).push(rect);
    }

    pub fn update_interval_ms(&self) -> u32 {
        self.update_interval_ms.load(Ordering::Relaxed)
    }

    /// Runs every hook registered for `reason`, oldest first.
    pub fn notify(&self, reason: TeardownReason) {
        let notifiers = locked(&self.notifiers);
        info!("console teardown notification: {reason:?}");
        for (_, hook) in notifiers.iter().filter(|(r, _)| *r == reason) {
            hook();
        }
    }

    fn current_listener(&self) -> Option<Arc<dyn DisplayListener>> {
        locked(&self.listener).clone()
    }
}

impl Console for HeadlessConsole {
    fn register_listener(&self, listener: Arc<dyn DisplayListener>) {
        *locked(&self.listener) = Some(Arc::clone(&listener));
        listener.on_switch(Arc::clone(&self.surface));
    }

    fn unregister_listener(&self) {
        locked(&self.listener).take();
    }

    fn update_framebuffer(&self) {
        let pending: Vec<Rect> = std::mem::take(&mut *locked(&self.damage));
        if let Some(listener) = self.current_listener() {
            for rect in pending {
                listener.on_update(rect.x, rect.y, rect.w, rect.h);
            }
        }
    }

    fn set_update_interval(&self, interval_ms: u32) {
        let previous = self.update_interval_ms.swap(interval_ms, Ordering::Relaxed);
        if previous != interval_ms {
            debug!("console update interval {previous} -> {interval_ms} ms");
        }
    }

    fn queue_abs(&self, axis: InputAxis, value: u32) {
        trace!("input: abs {axis:?} = {value}");
    }

    fn queue_button(&self, button: PointerButton, pressed: bool) {
        trace!("input: button {button:?} pressed={pressed}");
    }

    fn sync_input(&self) {
        trace!("input: sync");
    }

    fn send_key_number(&self, keycode: u32, pressed: bool) {
        trace!("input: key 0x{keycode:X} pressed={pressed}");
    }

    fn send_key_name(&self, key: KeyName, pressed: bool) {
        trace!("input: key {key:?} pressed={pressed}");
    }

    fn send_key_delay(&self, delay_ms: u32) {
        trace!("input: key delay {delay_ms} ms");
    }

    fn add_teardown_notifier(&self, reason: TeardownReason, hook: TeardownHook) {
        locked(&self.notifiers).push((reason, hook));
    }
}
