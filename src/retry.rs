//! Retry ceilings and backoff, shared by insertion and matching.
//!
//! Every optimistic loop in the venue is bounded: insertion retries, the
//! forced-insertion fallback, and matching iterations all have explicit
//! ceilings, after which the caller gets an explicit outcome instead of a
//! silent hang. Failed insertion attempts sleep for a monotonically growing,
//! capped interval to take pressure off a contended book.

use std::time::Duration;

/// Bounds and pacing for the venue's optimistic-concurrency loops.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Ordered-insertion attempts before falling back
    pub max_insert_retries: u32,
    /// Unconditional head-insertion attempts after the retry budget is gone
    pub forced_attempts: u32,
    /// Matching iterations per symbol per draining pass
    pub max_match_iterations: u32,
    /// Backoff added per failed insertion attempt
    pub base_backoff: Duration,
    /// Ceiling on a single backoff sleep
    pub max_backoff: Duration,
    /// Pause between forced-insertion attempts
    pub forced_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_insert_retries: 50,
            forced_attempts: 5,
            max_match_iterations: 5_000,
            base_backoff: Duration::from_micros(500),
            max_backoff: Duration::from_millis(100),
            forced_pause: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// A policy with no sleeping, for tests and benchmarks where wall-clock
    /// backoff would only slow things down.
    pub fn spinning() -> Self {
        Self {
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            forced_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Backoff for the given failed attempt (1-based): grows linearly with
    /// the attempt count, capped at `max_backoff`.
    #[inline]
    pub fn backoff(&self, attempt: u32) -> Duration {
        (self.base_backoff * attempt).min(self.max_backoff)
    }

    /// Sleep out the backoff for a failed attempt. Zero-length backoffs
    /// degrade to a spin hint so the loop still yields the core briefly.
    pub fn sleep_backoff(&self, attempt: u32) {
        let pause = self.backoff(attempt);
        if pause.is_zero() {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(pause);
        }
    }
}
