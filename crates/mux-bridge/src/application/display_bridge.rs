//! Display Bridge: console framebuffer callbacks → outbound mux messages.
//!
//! Callbacks arrive on the console's rendering thread.  Each one turns into
//! zero or more [`MuxMessage`]s pushed onto an unbounded queue drained by the
//! outbound loop, so a callback never waits on the channel.  A single queue
//! keeps messages in callback order: a `SurfaceChanged` always reaches the mux
//! before the damage regions that follow it.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use mux_core::protocol::messages::SurfaceChangedMessage;
use mux_core::{DisplaySurface, MuxMessage, PixelFormat};

use super::console::{Console, DisplayListener};
use super::refresh::RefreshNegotiator;

// ── Surface slot ──────────────────────────────────────────────────────────────

/// Weak handle to the console's current surface.
///
/// Written on every switch, read by the inbound loop to scale pointer input.
/// The console owns the surface; once it drops it, [`SurfaceSlot::current`]
/// returns `None` until the next switch.
#[derive(Default)]
pub struct SurfaceSlot {
    inner: RwLock<Option<Weak<DisplaySurface>>>,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, surface: &Arc<DisplaySurface>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::downgrade(surface));
    }

    /// Copy of the current surface geometry, if the console still holds it.
    pub fn current(&self) -> Option<DisplaySurface> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|surface| *surface)
    }
}

// ── Display bridge ────────────────────────────────────────────────────────────

pub struct DisplayBridge {
    outbound: UnboundedSender<MuxMessage>,
    surface: Arc<SurfaceSlot>,
    console: Arc<dyn Console>,
    refresh: Arc<RefreshNegotiator>,
}

impl DisplayBridge {
    pub fn new(
        outbound: UnboundedSender<MuxMessage>,
        surface: Arc<SurfaceSlot>,
        console: Arc<dyn Console>,
        refresh: Arc<RefreshNegotiator>,
    ) -> Self {
        Self {
            outbound,
            surface,
            console,
            refresh,
        }
    }

    pub fn surface(&self) -> &Arc<SurfaceSlot> {
        &self.surface
    }

    /// Queues `msg` for the outbound loop.  Returns `false` once the loop has
    /// gone away; the message is dropped.
    pub fn enqueue(&self, msg: MuxMessage) -> bool {
        match self.outbound.send(msg) {
            Ok(()) => true,
            Err(err) => {
                debug!("outbound queue closed; dropping {:?}", err.0.message_type());
                false
            }
        }
    }
}

impl DisplayListener for DisplayBridge {
    fn on_update(&self, x: i32, y: i32, w: i32, h: i32) {
        self.enqueue(MuxMessage::damage(x, y, w, h));
    }

    fn on_switch(&self, surface: Arc<DisplaySurface>) {
        info!(
            "display switch: {}x{} {:?}",
            surface.width, surface.height, surface.format
        );
        self.surface.replace(&surface);
        self.enqueue(MuxMessage::SurfaceChanged(SurfaceChangedMessage {
            width: surface.width,
            height: surface.height,
        }));
    }

    fn on_copy(&self, src_x: i32, src_y: i32, dst_x: i32, dst_y: i32, w: i32, h: i32) {
        self.enqueue(MuxMessage::damage(src_x, src_y, w, h));
        self.enqueue(MuxMessage::damage(dst_x, dst_y, w, h));
    }

    fn on_refresh(&self) {
        self.console.update_framebuffer();
        self.refresh.publish();
    }

    fn check_format(&self, format: PixelFormat) -> bool {
        format.is_supported()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
