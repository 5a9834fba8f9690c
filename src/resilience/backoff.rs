//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before redelivery number `attempt` (1-based), doubling from `base_ms` up to `max_ms`.
pub fn exponential_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Add up to 10% random jitter so redeliveries of many jobs do not line up.
pub fn with_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    let range = millis / 10;
    if range == 0 {
        return delay;
    }
    Duration::from_millis(millis + rand::thread_rng().gen_range(0..range))
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    with_jitter(exponential_delay(attempt, base_ms, max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_curve() {
        assert_eq!(exponential_delay(0, 100, 2000), Duration::ZERO);
        assert_eq!(exponential_delay(1, 100, 2000), Duration::from_millis(100));
        assert_eq!(exponential_delay(3, 100, 2000), Duration::from_millis(400));
        assert_eq!(exponential_delay(30, 100, 2000), Duration::from_millis(2000));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..50 {
            let delay = calculate_backoff(2, 1000, 60_000).as_millis();
            assert!((2000..2200).contains(&delay));
        }
        assert_eq!(with_jitter(Duration::from_millis(5)), Duration::from_millis(5));
    }
}
