//! Reconnection backoff
//!
//! `delay(attempt) = min(base * 2^(attempt - 1), max)` for attempts
//! `1..=max_attempts`; beyond that the session goes dormant.

use std::time::Duration;

/// Exponential reconnect schedule with a bounded number of attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect (default: 1 second)
    pub base_delay: Duration,
    /// Upper bound on any single delay (default: 30 seconds)
    pub max_delay: Duration,
    /// Attempts before giving up (default: 5). Zero disables reconnects.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Policy with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that never reconnects
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Set the base delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the attempt bound
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay before reconnect `attempt` (1-based), or `None` once the
    /// attempt bound is exceeded.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }

    /// Every delay in the schedule, in order
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).filter_map(|attempt| self.delay_for(attempt))
    }
}
