//! Reconnect backoff policy.

use std::time::Duration;

use crate::config::ConnectionStrategy;

/// Bounded exponential backoff for connection attempts.
///
/// The delay doubles on every consecutive failure, capped at `max_delay`.
/// `max_retry` bounds the retries after the initial attempt; once exceeded
/// the bridge gives up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retry: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with explicit bounds.
    pub fn new(max_retry: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retry,
            initial_delay,
            max_delay,
        }
    }

    /// Build a policy from the configured connection strategy.
    pub fn from_strategy(strategy: &ConnectionStrategy) -> Self {
        Self::new(
            strategy.max_retry,
            Duration::from_millis(strategy.initial_delay_ms),
            Duration::from_millis(strategy.max_delay_ms),
        )
    }

    /// The delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay.min(self.max_delay)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 1..retry {
            if delay >= self.max_delay {
                break;
            }
            delay = delay.saturating_mul(2).min(self.max_delay);
        }
        delay
    }

    /// Whether `failures` consecutive failed attempts exhaust the budget.
    ///
    /// The budget allows the initial attempt plus `max_retry` retries.
    pub fn exhausted(&self, failures: u32) -> bool {
        failures > self.max_retry
    }
}
