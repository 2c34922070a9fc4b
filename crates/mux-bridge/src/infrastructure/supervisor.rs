//! Loop supervisor: owns one bridge instance from startup to teardown.
//!
//! ```text
//! Idle → Resolving → Connecting → Running → Closed
//!           └──────────┴──────────────────────↗ (startup failure)
//! ```
//!
//! Startup resolves the channel address, opens the channel, then, and only
//! then, registers the display listener and spawns the three loops.  A
//! failed startup leaves the console exactly as it was.
//!
//! Teardown is idempotent.  The console's process-exit and power-down hooks
//! and the binary's Ctrl-C handler may all call it; only the first call does
//! anything.
//!
//! A session that loses one direction of its channel keeps running degraded.
//! Once both the inbound and outbound loops have stopped, nothing can reach
//! the mux any more and the bridge closes itself the same way teardown does.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mux_core::{BridgeState, MuxMessage, RefreshPolicy, SessionId};

use crate::application::console::{Console, DisplayListener, TeardownReason};
use crate::application::{
    DisplayBridge, InboundHandler, InputInjector, RefreshNegotiator, SurfaceSlot,
};
use crate::domain::{BridgeConfig, BridgeStatus};

use super::channel::{BridgeSession, ConnectionError};
use super::discovery::{resolve, DiscoveryError, DiscoveryExchange};
use super::loops::{run_inbound, run_outbound, run_periodic, LoopKind, LoopLiveness};

/// Why the bridge did not start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("session discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("session channel failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("bridge cannot start from state {0:?}")]
    AlreadyStarted(BridgeState),
}

/// Everything that exists only while the bridge is running.
struct ActiveSession {
    session: Arc<BridgeSession>,
    display: Arc<DisplayBridge>,
    shutdown: watch::Sender<bool>,
}

pub struct MuxBridge {
    config: BridgeConfig,
    console: Arc<dyn Console>,
    state: AtomicU8,
    torn_down: AtomicBool,
    liveness: Arc<LoopLiveness>,
    active: Mutex<Option<ActiveSession>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MuxBridge {
    pub fn new(config: BridgeConfig, console: Arc<dyn Console>) -> Arc<Self> {
        Arc::new(Self {
            config,
            console,
            state: AtomicU8::new(BridgeState::Idle as u8),
            torn_down: AtomicBool::new(false),
            liveness: Arc::new(LoopLiveness::default()),
            active: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: BridgeState, to: BridgeState) -> Result<(), BridgeState> {
        debug_assert!(from.can_transition_to(to));
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| debug!("bridge {from:?} -> {to:?}"))
            .map_err(BridgeState::from_u8)
    }

    fn fail(&self, from: BridgeState) {
        if self.transition(from, BridgeState::Closed).is_err() {
            debug!("bridge left {from:?} concurrently");
        }
    }

    /// Starts the bridge.
    ///
    /// Must be called from within a Tokio runtime; the three loops are
    /// spawned onto it.
    ///
    /// # Errors
    ///
    /// [`StartupError::Discovery`] or [`StartupError::Connection`] leave the
    /// bridge `Closed` with no listener registered and no loop running.
    /// [`StartupError::AlreadyStarted`] if this bridge is not `Idle`.
    pub async fn start(
        self: &Arc<Self>,
        exchange: &dyn DiscoveryExchange,
    ) -> Result<(), StartupError> {
        self.transition(BridgeState::Idle, BridgeState::Resolving)
            .map_err(StartupError::AlreadyStarted)?;

        let session_id = SessionId::random();
        info!(
            "starting bridge for {} {} (session {session_id})",
            self.config.service_name, self.config.object_path
        );

        let resolved = match resolve(
            exchange,
            &self.config.service_name,
            &self.config.object_path,
            session_id,
            self.config.port,
            self.config.auth_file.as_deref(),
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("cannot resolve mux channel: {e}");
                self.fail(BridgeState::Resolving);
                return Err(e.into());
            }
        };

        self.transition(BridgeState::Resolving, BridgeState::Connecting)
            .map_err(StartupError::AlreadyStarted)?;

        let session = Arc::new(BridgeSession::new(
            session_id,
            resolved.address,
            resolved.auth_token,
        ));
        let channel = match session.connect(self.config.connect_timeout()).await {
            Ok(channel) => channel,
            Err(e) => {
                error!("cannot connect to mux: {e}");
                self.fail(BridgeState::Connecting);
                return Err(e.into());
            }
        };

        // Wiring
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let surface = Arc::new(SurfaceSlot::new());
        let refresh = Arc::new(RefreshNegotiator::new(
            RefreshPolicy::with_initial(self.config.initial_refresh_ms),
            Arc::clone(&self.console),
        ));
        let display = Arc::new(DisplayBridge::new(
            outbound_tx,
            Arc::clone(&surface),
            Arc::clone(&self.console),
            Arc::clone(&refresh),
        ));
        let inbound = InboundHandler::new(
            InputInjector::new(Arc::clone(&self.console)),
            surface,
            Arc::clone(&refresh),
        );
        let (shutdown_tx, _) = watch::channel(false);

        self.console
            .register_listener(Arc::clone(&display) as Arc<dyn DisplayListener>);
        refresh.publish();

        let tasks = vec![
            self.spawn_channel_loop(
                LoopKind::Inbound,
                run_inbound(
                    channel.reader,
                    inbound,
                    shutdown_tx.subscribe(),
                    self.liveness.enter(LoopKind::Inbound),
                ),
            ),
            self.spawn_channel_loop(
                LoopKind::Outbound,
                run_outbound(
                    channel.writer,
                    outbound_rx,
                    shutdown_tx.subscribe(),
                    self.liveness.enter(LoopKind::Outbound),
                ),
            ),
            tokio::spawn(run_periodic(
                Arc::clone(&display),
                refresh,
                shutdown_tx.subscribe(),
                self.liveness.enter(LoopKind::Periodic),
            )),
        ];
        *locked(&self.tasks) = tasks;
        *locked(&self.active) = Some(ActiveSession {
            session,
            display,
            shutdown: shutdown_tx,
        });

        if let Err(state) = self.transition(BridgeState::Connecting, BridgeState::Running) {
            // Torn down while connecting: undo what was just set up.
            self.release();
            return Err(StartupError::AlreadyStarted(state));
        }
        self.register_teardown_hooks();
        info!("bridge running (session {session_id})");
        Ok(())
    }

    /// Spawns a loop that owns one direction of the channel and reports back
    /// when it ends.
    fn spawn_channel_loop<F>(self: &Arc<Self>, kind: LoopKind, run: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bridge: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            run.await;
            if let Some(bridge) = bridge.upgrade() {
                bridge.channel_loop_exited(kind);
            }
        })
    }

    /// Closes the bridge once neither direction of the channel is alive.
    fn channel_loop_exited(&self, kind: LoopKind) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        if self.liveness.is_running(LoopKind::Inbound)
            || self.liveness.is_running(LoopKind::Outbound)
        {
            warn!("{kind:?} loop ended; bridge running degraded");
            return;
        }
        if !self.begin_teardown() {
            return;
        }
        error!("session channel lost in both directions; closing bridge");
        self.finish_teardown();
    }

    fn register_teardown_hooks(self: &Arc<Self>) {
        for reason in [TeardownReason::ProcessExit, TeardownReason::PowerDown] {
            let bridge: Weak<Self> = Arc::downgrade(self);
            self.console.add_teardown_notifier(
                reason,
                Box::new(move || {
                    if let Some(bridge) = bridge.upgrade() {
                        bridge.teardown(reason);
                    }
                }),
            );
        }
    }

    /// Ends the session.  Returns `false` if teardown already ran.
    ///
    /// Queues a best-effort `Goodbye`, stops the loops, unregisters the
    /// display listener and closes the session.  Never blocks on I/O.
    pub fn teardown(&self, reason: TeardownReason) -> bool {
        if !self.begin_teardown() {
            debug!("teardown ({reason:?}) ignored: already torn down");
            return false;
        }
        info!("tearing down bridge: {reason:?}");
        self.finish_teardown();
        true
    }

    /// Claims the one teardown this bridge gets.
    fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    fn finish_teardown(&self) {
        self.release();
        self.state.store(BridgeState::Closed as u8, Ordering::Release);
    }

    fn release(&self) {
        let Some(active) = locked(&self.active).take() else {
            return;
        };
        active.display.enqueue(MuxMessage::Goodbye);
        // No receivers left just means every loop already exited.
        let _ = active.shutdown.send(true);
        self.console.unregister_listener();
        active.session.close();
    }

    /// Waits for every loop task to finish.  Returns at once if none were
    /// started.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *locked(&self.tasks));
        for task in tasks {
            if let Err(e) = task.await {
                error!("bridge loop task failed: {e}");
            }
        }
    }

    /// Current status.  Lock-free; never waits on I/O.
    pub fn status(&self) -> BridgeStatus {
        let state = self.state();
        if state != BridgeState::Running {
            return BridgeStatus::disabled(state);
        }
        BridgeStatus {
            enabled: true,
            state,
            service_name: Some(self.config.service_name.clone()),
            object_path: Some(self.config.object_path.clone()),
            port: self.config.port,
            auth_file: self.config.auth_file.clone(),
            loops: self.liveness.snapshot(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
