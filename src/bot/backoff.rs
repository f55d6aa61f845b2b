use rand::Rng;
use std::time::Duration;

/// Default delay of the first retry
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound of any single retry delay
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Jitter adds up to 1/JITTER_DIVISOR of the delay (10%)
const JITTER_DIVISOR: u32 = 10;

/// Exponential back-off for transient fetch failures
///
/// Delays double from `base_delay` (1s → 2s → 4s → ...) until they reach
/// `max_delay`. With `max_attempts` unset the loop retries indefinitely.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    current_attempt: u32,
    jitter: bool,
}

impl ExponentialBackoff {
    /// 1s base, 60s cap, unlimited attempts
    pub fn new() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
            current_attempt: 0,
            jitter: false,
        }
    }

    pub fn with_config(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts,
            current_attempt: 0,
            jitter: false,
        }
    }

    /// Randomize each delay upward by up to 10% so reconnecting clients spread out
    ///
    /// The jitter is smaller than the doubling step, so delays still grow
    /// strictly until they reach the cap.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before the next retry: `base_delay * 2^attempt`, capped at `max_delay`
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.checked_pow(self.current_attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        self.current_attempt = self.current_attempt.saturating_add(1);

        let delay = if self.jitter {
            let max_jitter_ms = (delay / JITTER_DIVISOR).as_millis() as u64;
            delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
        } else {
            delay
        };
        delay.min(self.max_delay)
    }

    /// Call after a successful fetch
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.current_attempt
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn has_exceeded_max_attempts(&self) -> bool {
        match self.max_attempts {
            Some(max) => self.current_attempt >= max,
            None => false,
        }
    }

    pub fn should_retry(&self) -> bool {
        !self.has_exceeded_max_attempts()
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression() {
        let mut backoff = ExponentialBackoff::new();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1)); // 2^0 = 1
        assert_eq!(backoff.next_delay(), Duration::from_secs(2)); // 2^1 = 2
        assert_eq!(backoff.next_delay(), Duration::from_secs(4)); // 2^2 = 4
        assert_eq!(backoff.next_delay(), Duration::from_secs(8)); // 2^3 = 8
        assert_eq!(backoff.next_delay(), Duration::from_secs(16)); // 2^4 = 16
        assert_eq!(backoff.next_delay(), Duration::from_secs(32)); // 2^5 = 32
        assert_eq!(backoff.next_delay(), Duration::from_secs(60)); // 2^6 = 64 -> max 60
    }

    #[test]
    fn test_strictly_increasing_until_cap() {
        let mut backoff = ExponentialBackoff::with_config(
            Duration::from_millis(100),
            Duration::from_secs(5),
            None,
        );

        let mut previous = Duration::ZERO;
        loop {
            let delay = backoff.next_delay();
            assert!(delay <= Duration::from_secs(5));
            if delay == backoff.max_delay() {
                break;
            }
            assert!(delay > previous, "{:?} should exceed {:?}", delay, previous);
            previous = delay;
        }
        // stays at the cap
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_keeps_growth() {
        let mut backoff = ExponentialBackoff::with_config(
            Duration::from_secs(1),
            Duration::from_secs(60),
            None,
        )
        .with_jitter();

        let mut previous = Duration::ZERO;
        for _ in 0..6 {
            let delay = backoff.next_delay();
            assert!(delay > previous);
            previous = delay;
        }
        assert!(backoff.next_delay() <= Duration::from_secs(60));
    }

    #[test]
    fn test_no_overflow_after_many_attempts() {
        let mut backoff = ExponentialBackoff::new();
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(60));
        }
        assert!(backoff.should_retry());
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = ExponentialBackoff::new();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_max_attempts() {
        let mut backoff = ExponentialBackoff::with_config(
            Duration::from_secs(1),
            Duration::from_secs(60),
            Some(3),
        );

        assert!(backoff.should_retry());
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.should_retry());
        backoff.next_delay();
        assert!(!backoff.should_retry());

        backoff.reset();
        assert!(backoff.should_retry());
    }
}
