//! Bounded retry policies.
//!
//! Retries in tapdeck use a fixed number of attempts with a fixed pause in
//! between, without backoff or jitter. The pause only happens between two
//! attempts, never after the last one.

use std::{fmt, num::NonZeroU32, time::Duration};

/// Maximum attempts and the pause between two consecutive attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Three attempts, two seconds apart. Used for token fetches and device
    /// lookups alike.
    pub const DEFAULT: Self = Self::new(
        match NonZeroU32::new(3) {
            Some(n) => n,
            None => unreachable!(),
        },
        Duration::from_secs(2),
    );

    #[must_use]
    pub const fn new(max_attempts: NonZeroU32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy without pauses, for tests and impatient callers.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(
            NonZeroU32::new(max_attempts).expect("attempts must be non-zero"),
            Duration::ZERO,
        )
    }

    /// Iterates over the one-based attempt numbers.
    pub fn attempts(&self) -> impl Iterator<Item = u32> {
        1..=self.max_attempts.get()
    }

    /// Whether another attempt follows `attempt`.
    #[must_use]
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.get()
    }

    /// Sleeps for the configured delay, unless it is zero.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Upper bound on the total time spent pausing between attempts.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.delay * (self.max_attempts.get() - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempts, {:.1}s apart",
            self.max_attempts,
            self.delay.as_secs_f32()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_three_attempts_two_seconds_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(policy.total_delay(), Duration::from_secs(4));
        assert!(policy.has_next(2));
        assert!(!policy.has_next(3));
        assert_eq!(policy.to_string(), "3 attempts, 2.0s apart");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_waits_for_the_delay() {
        let policy = RetryPolicy::new(NonZeroU32::MIN, Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        policy.pause().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
