//! Refresh negotiator: applies mux rate reports and keeps the console's
//! update interval in step with the policy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use mux_core::RefreshPolicy;

use super::console::Console;

pub struct RefreshNegotiator {
    policy: Mutex<RefreshPolicy>,
    console: Arc<dyn Console>,
}

impl RefreshNegotiator {
    pub fn new(policy: RefreshPolicy, console: Arc<dyn Console>) -> Self {
        Self {
            policy: Mutex::new(policy),
            console,
        }
    }

    /// Applies a reported rate and reports the effective interval to the
    /// console, whether or not it changed.
    pub fn negotiate(&self, reported_rate: u32) -> u32 {
        let interval = self
            .policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .negotiate(reported_rate);
        debug!("refresh rate report {reported_rate} -> interval {interval} ms");
        self.console.set_update_interval(interval);
        interval
    }

    /// Reports the current interval to the console without changing it.
    pub fn publish(&self) -> u32 {
        let interval = self.current_interval();
        self.console.set_update_interval(interval);
        interval
    }

    pub fn current_interval(&self) -> u32 {
        self.policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_interval()
    }

    /// How long the periodic loop sleeps between refresh ticks.
    pub fn current(&self) -> Duration {
        Duration::from_millis(u64::from(self.current_interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::console::mock::{ConsoleCall, RecordingConsole};

    fn negotiator(initial: u32) -> (RefreshNegotiator, Arc<RecordingConsole>) {
        let console = Arc::new(RecordingConsole::new());
        let negotiator = RefreshNegotiator::new(
            RefreshPolicy::with_initial(initial),
            Arc::clone(&console) as Arc<dyn Console>,
        );
        (negotiator, console)
    }

    #[test]
    fn test_boundary_reports_leave_interval_but_still_publish() {
        // Arrange
        let (negotiator, console) = negotiator(20);

        // Act
        assert_eq!(negotiator.negotiate(3), 20);
        assert_eq!(negotiator.negotiate(60), 20);

        // Assert: both unchanged values were still reported to the console
        assert_eq!(
            console.calls(),
            vec![ConsoleCall::SetInterval(20), ConsoleCall::SetInterval(20)]
        );
    }

    #[test]
    fn test_in_range_report_is_adopted_and_published() {
        let (negotiator, console) = negotiator(20);

        assert_eq!(negotiator.negotiate(30), 30);
        assert_eq!(negotiator.current(), Duration::from_millis(30));
        assert_eq!(console.calls(), vec![ConsoleCall::SetInterval(30)]);
    }

    #[test]
    fn test_publish_reports_current_interval() {
        let (negotiator, console) = negotiator(42);
        assert_eq!(negotiator.publish(), 42);
        assert_eq!(console.calls(), vec![ConsoleCall::SetInterval(42)]);
    }
}
