//! Retry timing for the fetcher and pacing for the scheduler
//!
//! Rate-limited responses back off exponentially from a base wait and are
//! clamped to a cap; network failures wait a flat cooldown. Both share one
//! attempt ceiling.

use crate::config::FetcherConfig;
use rand::Rng;
use std::time::Duration;

/// Retry timing derived from the fetcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling shared by rate-limit and network retries
    pub max_attempts: u32,

    /// First rate-limit backoff step
    pub backoff_base: Duration,

    /// Upper bound for any rate-limit backoff
    pub backoff_cap: Duration,

    /// Flat wait after a network error
    pub network_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_base: Duration::from_secs(20),
            backoff_cap: Duration::from_secs(120),
            network_cooldown: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
            network_cooldown: Duration::from_millis(config.network_cooldown_ms),
        }
    }

    /// Wait before retrying after the `attempt`-th (0-based) rate-limited response
    ///
    /// Computed as `min(base * 2^attempt, cap)`; overflow saturates to the cap.
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }

    /// Wait before retrying after a network error
    pub fn network_cooldown(&self) -> Duration {
        self.network_cooldown
    }
}

/// Draws a uniformly random duration in `[min, max]`
///
/// A reversed range is treated as the single value `min`.
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }

    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
