//! Harvest constants and retry policy

use std::time::Duration;

/// First backoff delay.
pub const MIN_BACKOFF: Duration = Duration::from_secs(2);

/// Backoff delays double up to this cap.
pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// A logical request is abandoned once this much time has been spent on it.
pub const MAX_ELAPSED: Duration = Duration::from_secs(20);

/// Results per search page (API maximum).
pub const SEARCH_PAGE_SIZE: u32 = 50;

/// IDs per batch lookup call (API maximum).
pub const LOOKUP_CHUNK_SIZE: usize = 50;

/// Results per thread or reply page (API maximum).
pub const THREAD_PAGE_SIZE: u32 = 100;

/// Threads with more replies than this get a nested reply pass.
pub const REPLY_THRESHOLD: u64 = 5;

/// Exponential backoff bounded by an elapsed-time ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub min_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Total time budget for one logical request
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(min_delay: Duration, max_delay: Duration, max_elapsed: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            max_elapsed,
        }
    }

    /// Delay after the given failed attempt (1-based): `min * 2^(attempt-1)`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another attempt fits in the budget after waiting `backoff`.
    pub fn allows_retry(&self, elapsed: Duration, backoff: Duration) -> bool {
        elapsed.saturating_add(backoff) <= self.max_elapsed
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MIN_BACKOFF, MAX_BACKOFF, MAX_ELAPSED)
    }
}
