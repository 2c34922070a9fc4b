//! Delivers decoded input events to the console's input queue.

use std::sync::Arc;

use mux_core::InputEvent;

use super::console::{Console, InputAxis, KeyName};

pub struct InputInjector {
    console: Arc<dyn Console>,
}

impl InputInjector {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }

    /// Injects one event.
    ///
    /// - Pointer moves queue X, then Y, then sync.
    /// - Button changes queue the button, then sync.
    /// - Meta keys go by name; every other key goes by number followed by a
    ///   zero key delay.
    pub fn inject(&self, event: InputEvent) {
        match event {
            InputEvent::PointerMove { x, y } => {
                self.console.queue_abs(InputAxis::X, x);
                self.console.queue_abs(InputAxis::Y, y);
                self.console.sync_input();
            }
            InputEvent::PointerButton { button, pressed } => {
                self.console.queue_button(button, pressed);
                self.console.sync_input();
            }
            InputEvent::KeyEvent {
                pressed,
                is_meta: true,
                ..
            } => {
                self.console.send_key_name(KeyName::LeftMeta, pressed);
            }
            InputEvent::KeyEvent {
                keycode, pressed, ..
            } => {
                self.console.send_key_number(keycode, pressed);
                self.console.send_key_delay(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mux_core::PointerButton;

    use super::*;
    use crate::infrastructure::console::mock::{ConsoleCall, RecordingConsole};

    fn injector() -> (InputInjector, Arc<RecordingConsole>) {
        let console = Arc::new(RecordingConsole::new());
        (
            InputInjector::new(Arc::clone(&console) as Arc<dyn Console>),
            console,
        )
    }

    #[test]
    fn test_move_queues_both_axes_then_syncs() {
        // Arrange
        let (injector, console) = injector();

        // Act
        injector.inject(InputEvent::PointerMove { x: 100, y: 200 });

        // Assert
        assert_eq!(
            console.calls(),
            vec![
                ConsoleCall::QueueAbs(InputAxis::X, 100),
                ConsoleCall::QueueAbs(InputAxis::Y, 200),
                ConsoleCall::SyncInput,
            ]
        );
    }

    #[test]
    fn test_button_queues_then_syncs() {
        let (injector, console) = injector();

        injector.inject(InputEvent::PointerButton {
            button: PointerButton::Middle,
            pressed: false,
        });

        assert_eq!(
            console.calls(),
            vec![
                ConsoleCall::QueueButton(PointerButton::Middle, false),
                ConsoleCall::SyncInput,
            ]
        );
    }

    #[test]
    fn test_meta_key_goes_by_name_without_delay() {
        let (injector, console) = injector();

        injector.inject(InputEvent::KeyEvent {
            keycode: 0x5B,
            pressed: true,
            is_meta: true,
        });

        assert_eq!(
            console.calls(),
            vec![ConsoleCall::KeyName(KeyName::LeftMeta, true)]
        );
    }

    #[test]
    fn test_raw_key_is_followed_by_zero_delay_on_press_and_release() {
        let (injector, console) = injector();

        injector.inject(InputEvent::KeyEvent {
            keycode: 0x1E,
            pressed: true,
            is_meta: false,
        });
        injector.inject(InputEvent::KeyEvent {
            keycode: 0x1E,
            pressed: false,
            is_meta: false,
        });

        assert_eq!(
            console.calls(),
            vec![
                ConsoleCall::KeyNumber(0x1E, true),
                ConsoleCall::KeyDelay(0),
                ConsoleCall::KeyNumber(0x1E, false),
                ConsoleCall::KeyDelay(0),
            ]
        );
    }
}
