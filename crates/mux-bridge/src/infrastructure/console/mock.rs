//! Recording console for tests.
//!
//! Every [`Console`] call is appended to an in-memory log so tests can assert
//! exactly what reached the console and in what order.  The registered
//! listener and teardown hooks are kept so tests can drive display callbacks
//! and fire teardown notifications by hand.
//!
//! ```ignore
//! let console = Arc::new(RecordingConsole::new());
//! let injector = InputInjector::new(Arc::clone(&console) as Arc<dyn Console>);
//!
//! injector.inject(event);
//!
//! assert_eq!(console.calls(), vec![ConsoleCall::QueueAbs(InputAxis::X, 0), ...]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mux_core::PointerButton;

use crate::application::console::{
    Console, DisplayListener, InputAxis, KeyName, TeardownHook, TeardownReason,
};

/// One recorded console call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCall {
    RegisterListener,
    UnregisterListener,
    UpdateFramebuffer,
    SetInterval(u32),
    QueueAbs(InputAxis, u32),
    QueueButton(PointerButton, bool),
    SyncInput,
    KeyNumber(u32, bool),
    KeyName(KeyName, bool),
    KeyDelay(u32),
    AddTeardownNotifier(TeardownReason),
}

#[derive(Default)]
pub struct RecordingConsole {
    calls: Mutex<Vec<ConsoleCall>>,
    listener: Mutex<Option<Arc<dyn DisplayListener>>>,
    notifiers: Mutex<Vec<(TeardownReason, TeardownHook)>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<ConsoleCall> {
        locked(&self.calls).clone()
    }

    /// Calls recorded so far, excluding listener and notifier registration.
    pub fn input_calls(&self) -> Vec<ConsoleCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    ConsoleCall::RegisterListener
                        | ConsoleCall::UnregisterListener
                        | ConsoleCall::AddTeardownNotifier(_)
                        | ConsoleCall::UpdateFramebuffer
                        | ConsoleCall::SetInterval(_)
                )
            })
            .collect()
    }

    pub fn listener(&self) -> Option<Arc<dyn DisplayListener>> {
        locked(&self.listener).clone()
    }

    pub fn is_registered(&self) -> bool {
        locked(&self.listener).is_some()
    }

    /// Runs every hook registered for `reason`.
    pub fn fire(&self, reason: TeardownReason) {
        let notifiers = locked(&self.notifiers);
        for (_, hook) in notifiers.iter().filter(|(r, _)| *r == reason) {
            hook();
        }
    }

    fn record(&self, call: ConsoleCall) {
        locked(&self.calls).push(call);
    }
}

impl Console for RecordingConsole {
    fn register_listener(&self, listener: Arc<dyn DisplayListener>) {
        self.record(ConsoleCall::RegisterListener);
        *locked(&self.listener) = Some(listener);
    }

    fn unregister_listener(&self) {
        self.record(ConsoleCall::UnregisterListener);
        locked(&self.listener).take();
    }

    fn update_framebuffer(&self) {
        self.record(ConsoleCall::UpdateFramebuffer);
    }

    fn set_update_interval(&self, interval_ms: u32) {
        self.record(ConsoleCall::SetInterval(interval_ms));
    }

    fn queue_abs(&self, axis: InputAxis, value: u32) {
        self.record(ConsoleCall::QueueAbs(axis, value));
    }

    fn queue_button(&self, button: PointerButton, pressed: bool) {
        self.record(ConsoleCall::QueueButton(button, pressed));
    }

    fn sync_input(&self) {
        self.record(ConsoleCall::SyncInput);
    }

    fn send_key_number(&self, keycode: u32, pressed: bool) {
        self.record(ConsoleCall::KeyNumber(keycode, pressed));
    }

    fn send_key_name(&self, key: KeyName, pressed: bool) {
        self.record(ConsoleCall::KeyName(key, pressed));
    }

    fn send_key_delay(&self, delay_ms: u32) {
        self.record(ConsoleCall::KeyDelay(delay_ms));
    }

    fn add_teardown_notifier(&self, reason: TeardownReason, hook: TeardownHook) {
        self.record(ConsoleCall::AddTeardownNotifier(reason));
        locked(&self.notifiers).push((reason, hook));
    }
}
