//! Backoff for transient role-resolution failures.
//!
//! An unreachable identity endpoint never logs the user out; the controller
//! keeps the session pending and asks this policy how long to wait before
//! the next attempt.

use std::time::Duration;

use rand::Rng;

use crate::config::RetrySettings;

/// Fraction of the delay used as +/- jitter.
/// Spreads reconnect storms when many devices come back online together.
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms.max(settings.initial_backoff_ms)),
            max_attempts: settings.max_attempts,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay, no jitter growth. Handy for hosts that poll quickly.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_backoff: delay,
            max_backoff: delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether another attempt may follow `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }

    /// Jittered delay before retry number `attempt`, never above `max_backoff`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - JITTER_FRACTION)..=(1.0 + JITTER_FRACTION));
        base.mul_f64(factor).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::from(&RetrySettings {
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            max_attempts: None,
        })
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let policy = policy();
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay(5), Duration::from_secs(16));
        assert_eq!(policy.base_delay(6), Duration::from_secs(30));
        assert_eq!(policy.base_delay(1000), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_for_stays_within_jitter_and_cap() {
        let policy = policy();
        for attempt in 1..=10 {
            let base = policy.base_delay(attempt);
            let delay = policy.delay_for(attempt);
            assert!(delay >= base.mul_f64(1.0 - JITTER_FRACTION));
            assert!(delay <= policy.max_backoff);
        }
    }

    #[test]
    fn test_should_retry_unbounded_by_default() {
        assert!(policy().should_retry(u32::MAX - 1));
    }

    #[test]
    fn test_should_retry_bounded() {
        let policy = policy().with_max_attempts(3);
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_max_below_initial_is_raised() {
        let policy = RetryPolicy::from(&RetrySettings {
            initial_backoff_ms: 500,
            max_backoff_ms: 100,
            max_attempts: None,
        });
        assert_eq!(policy.max_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_zero_delay() {
        let policy = RetryPolicy::fixed(Duration::ZERO);
        assert_eq!(policy.delay_for(7), Duration::ZERO);
    }
}
