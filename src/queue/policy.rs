//! Retry policy carried by every enqueued job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::backoff::{calculate_backoff, exponential_delay};

/// Delay curve between redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every redelivery.
    Fixed { delay_ms: u64 },
    /// Doubling delay from `base_ms`, capped at `max_ms`, with up to 10% jitter.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Backoff {
    /// Delay before the redelivery that follows `attempts_made` failed attempts.
    pub fn delay(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms, max_ms } => calculate_backoff(attempts_made, base_ms, max_ms),
        }
    }

    /// The delay without jitter.
    pub fn nominal_delay(&self, attempts_made: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms, max_ms } => exponential_delay(attempts_made, base_ms, max_ms),
        }
    }
}

/// How many times a job may run and how long to wait between runs.
///
/// Independent of any queue backend, so retry semantics can be tested on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run once, never redeliver.
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed { delay_ms: 0 })
    }

    /// Deposit verification: 10 attempts, 5s doubling to 5 minutes.
    pub fn deposit_verification() -> Self {
        Self::new(
            10,
            Backoff::Exponential {
                base_ms: 5_000,
                max_ms: 300_000,
            },
        )
    }

    /// Prize payouts may be retried while no row has been written.
    pub fn prize_payout() -> Self {
        Self::new(
            3,
            Backoff::Exponential {
                base_ms: 10_000,
                max_ms: 120_000,
            },
        )
    }

    /// Whether a job that has already run `attempts_made` times may run again.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    pub fn delay_after(&self, attempts_made: u32) -> Duration {
        self.backoff.delay(attempts_made)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::deposit_verification();
        assert!(policy.allows_retry(9));
        assert!(!policy.allows_retry(10));

        let once = RetryPolicy::once();
        assert!(!once.allows_retry(1));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(0, Backoff::Fixed { delay_ms: 10 });
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_backoff_curves() {
        let fixed = Backoff::Fixed { delay_ms: 250 };
        assert_eq!(fixed.delay(7), Duration::from_millis(250));

        let exp = Backoff::Exponential { base_ms: 5_000, max_ms: 300_000 };
        assert_eq!(exp.nominal_delay(1), Duration::from_secs(5));
        assert_eq!(exp.nominal_delay(4), Duration::from_secs(40));
        assert_eq!(exp.nominal_delay(12), Duration::from_secs(300));
        assert!(exp.delay(2) >= Duration::from_secs(10));
    }

    #[test]
    fn test_policy_toml_shape() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            max_attempts = 4
            backoff = { kind = "exponential", base_ms = 100, max_ms = 1000 }
            "#,
        )
        .unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff, Backoff::Exponential { base_ms: 100, max_ms: 1000 });
    }
}
