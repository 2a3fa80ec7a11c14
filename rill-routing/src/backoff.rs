//! Retry backoff for directory fetch failures.
//!
//! Grows the delay by a factor of 1.5 on each failure, capped at a maximum,
//! and snaps back to the minimum on the first success.

use std::time::Duration;

/// Exponential backoff state for the update retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// The delay the next failure will schedule.
    current: Duration,
    /// Lower bound; also the reset value on success.
    min: Duration,
    /// Upper bound on the delay.
    max: Duration,
}

impl Backoff {
    /// Creates a backoff starting at the minimum delay.
    ///
    /// # Panics
    ///
    /// Panics if min > max.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        assert!(min <= max, "backoff min must be <= max");
        Self {
            current: min,
            min,
            max,
        }
    }

    /// Returns the delay to wait before the next attempt, then grows the
    /// stored delay by 1.5x up to the maximum.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 3 / 2).min(self.max);
        delay
    }

    /// Resets the delay to the minimum.
    pub fn on_success(&mut self) {
        self.current = self.min;
    }

    /// Returns the delay the next failure would schedule.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }
}
