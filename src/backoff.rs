use std::time::Duration;

/// Exponent cap: past 2^8 the delay only grows through `max_delay`.
const MAX_EXPONENT: u32 = 8;

// ── Decision ───────────────────────────────────────────────────────────────────

/// Outcome of the retry policy for one notification whose batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue on the input queue, invisible for `delay`.
    Retry {
        /// The `retry_count` the re-queued notification will carry.
        next_attempt: u32,
        delay: Duration,
    },

    /// Retry limit exhausted: write an error record and move the artifact.
    DeadLetter,
}

// ── Policy ─────────────────────────────────────────────────────────────────────

/// Exponential backoff with a floor (`initial_delay`) and a ceiling
/// (`max_delay`), plus the retry limit that decides when to stop.
///
/// The same delay curve is used for re-queued notifications and for the
/// first status poll of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Notifications with `retry_count <= retry_limit` are retried.
    pub retry_limit: u32,
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, retry_limit: u32) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            retry_limit,
        }
    }

    /// ```text
    /// delay(0) = initial
    /// delay(n) = min(2^min(n, 8) * initial, max)
    /// ```
    pub fn delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return self.initial_delay;
        }

        let factor = 1u32 << retry_count.min(MAX_EXPONENT);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Decide what to do with a notification whose batch failed.
    ///
    /// Throttling always retries; the limit only stops transient failures.
    pub fn decide(&self, retry_count: u32, throttled: bool) -> RetryDecision {
        if retry_count <= self.retry_limit || throttled {
            let next_attempt = retry_count.saturating_add(1);
            RetryDecision::Retry {
                next_attempt,
                delay: self.delay(next_attempt),
            }
        } else {
            RetryDecision::DeadLetter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(minutes(2), minutes(180), 4)
    }

    #[test]
    fn zero_retries_uses_initial_delay() {
        assert_eq!(policy().delay(0), minutes(2));
    }

    #[test]
    fn delay_doubles_then_caps() {
        let p = policy();
        assert_eq!(p.delay(1), minutes(4));
        assert_eq!(p.delay(2), minutes(8));
        assert_eq!(p.delay(6), minutes(128));
        assert_eq!(p.delay(7), minutes(180));
        assert_eq!(p.delay(u32::MAX), minutes(180));
    }

    #[test]
    fn delay_is_bounded_and_non_decreasing() {
        let p = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(1000), 4);
        let mut previous = p.delay(1);
        for n in 1..64 {
            let d = p.delay(n);
            assert!(d <= p.max_delay, "delay({n}) exceeds the cap");
            assert!(d >= previous, "delay({n}) decreased");
            previous = d;
        }
        // Exponent stops at 8: 256s stays below the 1000s cap forever.
        assert_eq!(p.delay(9), Duration::from_secs(256));
    }

    #[test]
    fn max_below_initial_is_raised_to_initial() {
        let p = BackoffPolicy::new(minutes(10), minutes(5), 1);
        assert_eq!(p.max_delay, minutes(10));
        assert_eq!(p.delay(3), minutes(10));
    }

    #[test]
    fn retry_at_limit_dead_letter_above() {
        let p = policy();
        assert_eq!(
            p.decide(4, false),
            RetryDecision::Retry { next_attempt: 5, delay: minutes(64) }
        );
        assert_eq!(p.decide(5, false), RetryDecision::DeadLetter);
    }

    #[test]
    fn throttling_ignores_the_limit() {
        assert!(matches!(
            policy().decide(50, true),
            RetryDecision::Retry { next_attempt: 51, .. }
        ));
    }
}
