use std::time::Duration;

/// Bounded retry schedule for transient failures.
///
/// Retry `k` (1-based) waits `base_delay * 2^(k-1)`; with the defaults that is
/// 100ms, 200ms and 400ms before the second, third and fourth attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (1-based). Saturates at
    /// `Duration::MAX`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1);
        2u32.checked_pow(exponent).map_or(Duration::MAX, |factor| {
            self.base_delay.saturating_mul(factor)
        })
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_BASE_DELAY)
    }
}
