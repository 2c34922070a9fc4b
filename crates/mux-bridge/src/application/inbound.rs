//! Routes messages received from the mux.
//!
//! Input messages are decoded against the current surface and injected;
//! rate reports go to the refresh negotiator.  Anything the mux has no
//! business sending is rejected so the inbound loop can log and skip it.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use mux_core::protocol::messages::MessageType;
use mux_core::{decode_keyboard, decode_mouse, DecodeError, MuxMessage};

use super::display_bridge::SurfaceSlot;
use super::inject_input::InputInjector;
use super::refresh::RefreshNegotiator;

/// Why an inbound message was dropped.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unexpected {0:?} message from mux")]
    Unexpected(MessageType),
}

pub struct InboundHandler {
    injector: InputInjector,
    surface: Arc<SurfaceSlot>,
    refresh: Arc<RefreshNegotiator>,
}

impl InboundHandler {
    pub fn new(
        injector: InputInjector,
        surface: Arc<SurfaceSlot>,
        refresh: Arc<RefreshNegotiator>,
    ) -> Self {
        Self {
            injector,
            surface,
            refresh,
        }
    }

    /// Handles one message.
    ///
    /// # Errors
    ///
    /// [`InboundError::Decode`] for input the codec rejects and
    /// [`InboundError::Unexpected`] for message types the bridge only sends.
    /// Either way nothing reached the console.
    pub fn handle(&self, msg: &MuxMessage) -> Result<(), InboundError> {
        match msg {
            MuxMessage::MouseInput(m) => {
                let surface = self.surface.current();
                let event = decode_mouse(m, surface.as_ref())?;
                self.injector.inject(event);
            }
            MuxMessage::KeyboardInput(k) => {
                let event = decode_keyboard(k)?;
                self.injector.inject(event);
            }
            MuxMessage::RefreshRateReport(r) => {
                let interval = self.refresh.negotiate(r.rate);
                debug!("refresh interval now {interval} ms");
            }
            other => return Err(InboundError::Unexpected(other.message_type())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mux_core::protocol::messages::{
        KeyboardInputMessage, MouseInputMessage, RefreshRateReportMessage,
    };
    use mux_core::{DisplaySurface, PixelFormat, PointerButton, RefreshPolicy};

    use super::*;
    use crate::application::console::{Console, InputAxis};
    use crate::infrastructure::console::mock::{ConsoleCall, RecordingConsole};

    struct Fixture {
        handler: InboundHandler,
        console: Arc<RecordingConsole>,
        surface: Arc<SurfaceSlot>,
        refresh: Arc<RefreshNegotiator>,
    }

    fn fixture() -> Fixture {
        let console = Arc::new(RecordingConsole::new());
        let dyn_console = Arc::clone(&console) as Arc<dyn Console>;
        let surface = Arc::new(SurfaceSlot::new());
        let refresh = Arc::new(RefreshNegotiator::new(
            RefreshPolicy::default(),
            Arc::clone(&dyn_console),
        ));
        let handler = InboundHandler::new(
            InputInjector::new(dyn_console),
            Arc::clone(&surface),
            Arc::clone(&refresh),
        );
        Fixture {
            handler,
            console,
            surface,
            refresh,
        }
    }

    #[test]
    fn test_mouse_move_is_scaled_against_current_surface() {
        // Arrange
        let f = fixture();
        let s = Arc::new(DisplaySurface::new(2, 2, PixelFormat::X8R8G8B8));
        f.surface.replace(&s);

        // Act
        f.handler
            .handle(&MuxMessage::MouseInput(MouseInputMessage {
                x: 1,
                y: 0,
                flags: 0x0800,
            }))
            .unwrap();

        // Assert
        assert_eq!(
            f.console.calls(),
            vec![
                ConsoleCall::QueueAbs(InputAxis::X, 0x7FFF),
                ConsoleCall::QueueAbs(InputAxis::Y, 0),
                ConsoleCall::SyncInput,
            ]
        );
    }

    #[test]
    fn test_mouse_move_without_surface_is_dropped() {
        let f = fixture();
        let result = f.handler.handle(&MuxMessage::MouseInput(MouseInputMessage {
            x: 1,
            y: 1,
            flags: 0x0800,
        }));
        assert_eq!(result, Err(InboundError::Decode(DecodeError::NoSurface)));
        assert!(f.console.calls().is_empty());
    }

    #[test]
    fn test_button_message_is_injected() {
        let f = fixture();
        f.handler
            .handle(&MuxMessage::MouseInput(MouseInputMessage {
                x: 0,
                y: 0,
                flags: 0x9000,
            }))
            .unwrap();
        assert_eq!(
            f.console.calls(),
            vec![
                ConsoleCall::QueueButton(PointerButton::Left, true),
                ConsoleCall::SyncInput
            ]
        );
    }

    #[test]
    fn test_invalid_keyboard_flags_reach_nothing() {
        let f = fixture();
        let result = f
            .handler
            .handle(&MuxMessage::KeyboardInput(KeyboardInputMessage {
                keycode: 0x1E,
                flags: 0x0001,
            }));
        assert!(matches!(result, Err(InboundError::Decode(_))));
        assert!(f.console.calls().is_empty());
    }

    #[test]
    fn test_rate_report_goes_to_negotiator() {
        let f = fixture();
        f.handler
            .handle(&MuxMessage::RefreshRateReport(RefreshRateReportMessage {
                rate: 16,
            }))
            .unwrap();
        assert_eq!(f.refresh.current_interval(), 16);
        assert_eq!(f.console.calls(), vec![ConsoleCall::SetInterval(16)]);
    }

    #[test]
    fn test_bridge_only_messages_are_unexpected() {
        let f = fixture();
        assert_eq!(
            f.handler.handle(&MuxMessage::damage(0, 0, 1, 1)),
            Err(InboundError::Unexpected(MessageType::DamageRegion))
        );
    }
}
