//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations. Grows more slowly than
//! exponential backoff, so a resource stuck on a flaky inventory keeps being
//! retried at a reasonable pace without hammering the API.
//!
//! Sequence with the controller defaults: 5s, 5s, 10s, 15s, 25s, 40s, ... 300s (max).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// First retry delay after a failed reconcile
pub const MIN_BACKOFF_SECONDS: u64 = 5;
/// Upper bound for the retry delay
pub const MAX_BACKOFF_SECONDS: u64 = 300;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given minimum and maximum, in seconds
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_seconds;

        let next = self.prev_seconds + self.current_seconds;
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);

        Duration::from_secs(result)
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF_SECONDS, MAX_BACKOFF_SECONDS)
    }
}

/// Per-resource backoff state, keyed by `namespace/name`
#[derive(Debug, Default)]
pub struct BackoffRegistry {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffRegistry {
    /// Delay before the next retry of `key`; advances that resource's sequence
    pub fn next_delay(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states.entry(key.to_string()).or_default().next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using minimum backoff", e);
                Duration::from_secs(MIN_BACKOFF_SECONDS)
            }
        }
    }

    /// Forget the failure history of `key` (on successful reconciliation).
    /// The entry is dropped so deleted resources do not linger.
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}
