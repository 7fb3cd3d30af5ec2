//! Exponential reconnect backoff.
//!
//! After `k` consecutive failures the delay is `min(initial * 2^(k-1), cap)`.
//! [`Backoff::reset`] is called when the connector reaches `Streaming`, so
//! the next failure waits `initial` again. The policy only computes delays;
//! the connector does the sleeping, which keeps it testable without a clock.

use std::time::Duration;

use pitwall_core::config::ReconnectConfig;

/// Reconnect delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    cap: Duration,
    failures: u32,
}

impl Backoff {
    /// A policy starting at `initial` and never exceeding `cap`.
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            cap: cap.max(initial),
            failures: 0,
        }
    }

    /// Build the policy from configuration.
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Count one more failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay_for(self.failures)
    }

    /// Delay after `failures` consecutive failures (0 means no wait).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let Some(exponent) = failures.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 2_u32.saturating_pow(exponent);
        self.initial
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Forget past failures.
    pub const fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn delays_double_until_capped() {
        let mut backoff = Backoff::new(secs(1), secs(60));
        let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(32), secs(60), secs(60)]
        );
        assert_eq!(backoff.failures(), 8);
    }

    #[test]
    fn closed_form_matches_for_any_failure_count() {
        let backoff = Backoff::new(Duration::from_millis(250), secs(60));
        for k in 1..=40_u32 {
            let expected = 2_u64
                .checked_pow(k - 1)
                .and_then(|f| f.checked_mul(250))
                .map_or(secs(60), |ms| Duration::from_millis(ms).min(secs(60)));
            assert_eq!(backoff.delay_for(k), expected, "k = {k}");
        }
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = Backoff::new(secs(1), secs(60));
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), secs(1));
    }

    #[test]
    fn huge_failure_counts_do_not_overflow() {
        let backoff = Backoff::new(secs(1), secs(60));
        assert_eq!(backoff.delay_for(u32::MAX), secs(60));
    }

    #[test]
    fn built_from_config_defaults() {
        let mut backoff = Backoff::from_config(&ReconnectConfig::default());
        assert_eq!(backoff.next_delay(), secs(1));
        assert_eq!(backoff.delay_for(10), secs(60));
    }
}
