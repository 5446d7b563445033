//! Bootstrap Retry Policy
//!
//! Bounded retry with exponential backoff: the delay after the n-th failed
//! attempt (counting from zero) is `base * 2^n`, without jitter.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

/// Upper bound for configured attempts
const MAX_ATTEMPTS_CAP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS_CAP),
            base_delay,
        }
    }

    /// Total attempts of one bootstrap cycle, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Fresh backoff schedule for one bootstrap cycle.
    pub fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(self.base_delay * 2u32.pow(self.max_attempts))
            .with_max_elapsed_time(None)
            .build();
        backoff.reset();
        backoff
    }

    /// Delays slept between the attempts of one cycle.
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.max_attempts)
            .map(|_| backoff.next_backoff().unwrap_or(self.base_delay))
            .collect()
    }
}
