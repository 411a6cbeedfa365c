//! Reconnect delay computation.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Exponential backoff state for one stream.
///
/// Tracks separate attempt counters for ordinary connect failures and
/// rate-limited rejections; the rate-limited ladder starts from the larger
/// `rate_limit_floor` so a throttling server is not hammered at the ordinary
/// schedule. Both ladders share the cap and reset together once a connection
/// has streamed long enough to count as stable.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: BackoffConfig,
    attempt: u32,
    rate_limited_attempt: u32,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempt: 0,
            rate_limited_attempt: 0,
        }
    }

    /// Consecutive failed attempts since the last reset.
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next ordinary reconnect attempt.
    ///
    /// `min(max_delay, initial_delay * multiplier^attempt)`, then advances
    /// the attempt counter.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.scaled(self.config.initial_delay, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Delay before the next attempt after a rate-limited rejection.
    ///
    /// Same shape as [`next_delay`](Self::next_delay) but grown from
    /// `rate_limit_floor`. Also advances the ordinary counter so a mixed
    /// failure sequence keeps backing off.
    pub(crate) fn next_rate_limited_delay(&mut self) -> Duration {
        let delay = self.scaled(self.config.rate_limit_floor, self.rate_limited_attempt);
        self.rate_limited_attempt = self.rate_limited_attempt.saturating_add(1);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset both ladders after a stable streaming period.
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
        self.rate_limited_attempt = 0;
    }

    /// Whether `streamed_for` of continuous streaming counts as stable.
    pub(crate) fn is_stable_period(&self, streamed_for: Duration) -> bool {
        streamed_for >= self.config.stability_window
    }

    fn scaled(&self, base: Duration, attempt: u32) -> Duration {
        let factor = self.config.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let secs = base.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.config.max_delay.as_secs_f64() {
            return self.config.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(320),
            multiplier: 2.0,
            stability_window: Duration::from_secs(60),
            rate_limit_floor: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_delays_follow_exponential_schedule() {
        let mut backoff = Backoff::new(config());
        let expected_ms = [250, 500, 1000, 2000, 4000, 8000];
        for (i, expected) in expected_ms.iter().enumerate() {
            assert_eq!(backoff.attempt(), u32::try_from(i).unwrap());
            assert_eq!(backoff.next_delay(), Duration::from_millis(*expected));
        }
    }

    #[test]
    fn test_delay_capped_at_max() {
        let mut backoff = Backoff::new(config());
        // 250ms * 2^20 is far past the 320s cap.
        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(320));
        assert_eq!(backoff.next_delay(), Duration::from_secs(320));
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = Backoff::new(config());
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_rate_limited_ladder_starts_at_floor() {
        let mut backoff = Backoff::new(config());
        assert_eq!(backoff.next_rate_limited_delay(), Duration::from_secs(60));
        assert_eq!(backoff.next_rate_limited_delay(), Duration::from_secs(120));
        assert_eq!(backoff.next_rate_limited_delay(), Duration::from_secs(240));
        assert_eq!(backoff.next_rate_limited_delay(), Duration::from_secs(320));
    }

    #[test]
    fn test_rate_limited_advances_ordinary_counter() {
        let mut backoff = Backoff::new(config());
        backoff.next_rate_limited_delay();
        backoff.next_rate_limited_delay();
        assert_eq!(backoff.attempt(), 2);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_multiplier_one_keeps_constant_delay() {
        let mut backoff = Backoff::new(BackoffConfig {
            multiplier: 1.0,
            ..config()
        });
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_stability_window_threshold() {
        let backoff = Backoff::new(config());
        assert!(!backoff.is_stable_period(Duration::from_secs(59)));
        assert!(backoff.is_stable_period(Duration::from_secs(60)));
        assert!(backoff.is_stable_period(Duration::from_secs(3600)));
    }
}
