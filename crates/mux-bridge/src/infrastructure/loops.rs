//! The three bridge loops.
//!
//! | loop     | waits on                     | does                                  |
//! |----------|------------------------------|---------------------------------------|
//! | inbound  | channel read                 | decode, inject into the console       |
//! | outbound | outbound queue, channel write| write queued frames in FIFO order     |
//! | periodic | refresh interval timer       | trigger a display refresh             |
//!
//! Every wait is raced against the shutdown signal, so teardown stops all
//! three promptly even when the channel is stalled.  A loop that hits a
//! [`ChannelError`](super::channel::ChannelError) logs it and returns; the
//! other loops are not told.  [`LoopLiveness`] records which loops are still
//! running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use mux_core::MuxMessage;

use crate::application::console::DisplayListener;
use crate::application::{DisplayBridge, InboundHandler, RefreshNegotiator};
use crate::domain::LoopStatus;

use super::channel::{FrameReader, FrameWriter};

/// How long the outbound loop keeps flushing queued frames after shutdown.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

// ── Liveness ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Inbound,
    Outbound,
    Periodic,
}

impl LoopKind {
    fn index(self) -> usize {
        match self {
            LoopKind::Inbound => 0,
            LoopKind::Outbound => 1,
            LoopKind::Periodic => 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoopLiveness {
    running: [AtomicBool; 3],
}

impl LoopLiveness {
    /// Marks `kind` running until the returned guard is dropped.
    pub fn enter(self: &Arc<Self>, kind: LoopKind) -> LivenessGuard {
        self.running[kind.index()].store(true, Ordering::Release);
        LivenessGuard {
            liveness: Arc::clone(self),
            kind,
        }
    }

    pub fn is_running(&self, kind: LoopKind) -> bool {
        self.running[kind.index()].load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> LoopStatus {
        LoopStatus {
            inbound: self.is_running(LoopKind::Inbound),
            outbound: self.is_running(LoopKind::Outbound),
            periodic: self.is_running(LoopKind::Periodic),
        }
    }
}

pub struct LivenessGuard {
    liveness: Arc<LoopLiveness>,
    kind: LoopKind,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.liveness.running[self.kind.index()].store(false, Ordering::Release);
        debug!("{:?} loop stopped", self.kind);
    }
}

// ── Loops ─────────────────────────────────────────────────────────────────────

/// Receives frames until shutdown, end of stream, or a channel error.
/// Frames that do not decode, and messages the handler rejects, are logged
/// and skipped.
pub async fn run_inbound<R>(
    mut reader: FrameReader<R>,
    handler: InboundHandler,
    mut shutdown: watch::Receiver<bool>,
    _guard: LivenessGuard,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = reader.next_frame() => next,
        };
        match next {
            Ok(Some(Ok(msg))) => {
                debug!("inbound {:?}", msg.message_type());
                if let Err(e) = handler.handle(&msg) {
                    warn!("dropping inbound message: {e}");
                }
            }
            Ok(Some(Err(e))) => warn!("dropping malformed inbound frame: {e}"),
            Ok(None) => {
                info!("mux closed the session channel");
                break;
            }
            Err(e) => {
                error!("inbound loop stopped: {e}");
                break;
            }
        }
    }
}

/// Writes queued messages in order until shutdown, the queue closing, or a
/// channel error.  On shutdown, frames already queued (such as `Goodbye`)
/// get a short best-effort flush.
pub async fn run_outbound<W>(
    mut writer: FrameWriter<W>,
    mut queue: UnboundedReceiver<MuxMessage>,
    mut shutdown: watch::Receiver<bool>,
    _guard: LivenessGuard,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            msg = queue.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = shutdown.changed() => {
                flush_pending(&mut writer, &mut queue).await;
                break;
            }
        };
        let sent = tokio::select! {
            biased;
            sent = writer.send(&msg) => sent,
            _ = shutdown.changed() => break,
        };
        if let Err(e) = sent {
            error!("outbound loop stopped: {e}");
            break;
        }
    }
}

async fn flush_pending<W>(writer: &mut FrameWriter<W>, queue: &mut UnboundedReceiver<MuxMessage>)
where
    W: AsyncWrite + Unpin,
{
    let flush = async {
        while let Ok(msg) = queue.try_recv() {
            if writer.send(&msg).await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, flush).await.is_err() {
        debug!("outbound flush abandoned after {SHUTDOWN_FLUSH_TIMEOUT:?}");
    }
}

/// Triggers a display refresh every negotiated interval until shutdown.
///
/// The interval is re-read on every tick, so a rate report takes effect on
/// the next sleep.
pub async fn run_periodic(
    display: Arc<DisplayBridge>,
    refresh: Arc<RefreshNegotiator>,
    mut shutdown: watch::Receiver<bool>,
    _guard: LivenessGuard,
) {
    loop {
        let interval = refresh.current().max(Duration::from_millis(1));
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => display.on_refresh(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
