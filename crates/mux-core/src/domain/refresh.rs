//! Refresh-interval policy negotiated between the console and the mux.
//!
//! The mux reports the refresh interval it can keep up with.  A report is
//! adopted only when it lies strictly between the bounds; values on or outside
//! a bound are ignored rather than clamped, so a misbehaving mux can never
//! push the console to an extreme cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest interval bound in milliseconds (exclusive).
pub const MIN_INTERVAL_MS: u32 = 3;
/// Largest interval bound in milliseconds (exclusive).
pub const MAX_INTERVAL_MS: u32 = 60;
/// The console's default refresh interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u32 = 30;

/// Current refresh interval and the bounds it may move within.
///
/// Invariant: `current_interval` only changes to a value `v` with
/// `min_interval < v < max_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
    min_interval: u32,
    max_interval: u32,
    current_interval: u32,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            min_interval: MIN_INTERVAL_MS,
            max_interval: MAX_INTERVAL_MS,
            current_interval: DEFAULT_INTERVAL_MS,
        }
    }
}

impl RefreshPolicy {
    /// Creates a policy with the standard bounds and the given starting
    /// interval.  The starting interval is not range-checked; it is whatever
    /// the console was already using.
    pub fn with_initial(current_interval: u32) -> Self {
        Self {
            current_interval,
            ..Self::default()
        }
    }

    /// Applies a reported rate and returns the effective interval.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mux_core::domain::refresh::RefreshPolicy;
    ///
    /// let mut policy = RefreshPolicy::default();
    /// assert_eq!(policy.negotiate(16), 16);
    /// assert_eq!(policy.negotiate(60), 16); // boundary rejected
    /// ```
    pub fn negotiate(&mut self, reported_rate: u32) -> u32 {
        if self.min_interval < reported_rate && reported_rate < self.max_interval {
            self.current_interval = reported_rate;
        } else {
            debug!(
                "ignoring refresh report {reported_rate} outside ({}, {}), keeping {}",
                self.min_interval, self.max_interval, self.current_interval
            );
        }
        self.current_interval
    }

    pub fn current_interval(&self) -> u32 {
        self.current_interval
    }

    /// The current interval as a [`Duration`].
    pub fn current(&self) -> Duration {
        Duration::from_millis(u64::from(self.current_interval))
    }
}
