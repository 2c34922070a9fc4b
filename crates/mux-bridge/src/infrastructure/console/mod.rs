//! Concrete [`Console`](crate::application::console::Console) implementations.
//!
//! | Type               | Use                                 |
//! |--------------------|-------------------------------------|
//! | `HeadlessConsole`  | the `mux-bridge` binary, no guest   |
//! | `RecordingConsole` | unit and integration tests          |

pub mod headless;
pub mod mock;

pub use headless::HeadlessConsole;
pub use mock::{ConsoleCall, RecordingConsole};
