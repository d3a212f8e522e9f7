//! # Fibonacci Backoff
//!
//! Progressive retry delay that grows more slowly than exponential backoff.
//! Each delay is the sum of the previous two, starting from the minimum twice
//! and capped at the maximum: with 5s/300s that is 5s, 5s, 10s, 15s, 25s, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// The dispatcher keeps one per SparkNotebook key and drops it after a
/// successful reconcile, so the next failure starts from the minimum again.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value
    prev: Duration,
    /// Current backoff value
    current: Duration,
    /// Maximum backoff value
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);

        result
    }
}
