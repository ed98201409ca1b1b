use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Linear backoff: the n-th retry waits `backoff_step * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt (so `max_retries + 1` attempts total).
    pub max_retries: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after attempt `attempt` (1-based) failed.
    pub fn decide(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if !retryable || attempt > self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt))
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_for_non_retryable() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, false), RetryDecision::NoRetry);
    }

    #[test]
    fn linear_backoff() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, true), RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(p.decide(2, true), RetryDecision::RetryAfter(Duration::from_secs(2)));
        assert_eq!(p.decide(5, true), RetryDecision::RetryAfter(Duration::from_secs(5)));
    }

    #[test]
    fn respects_max_retries() {
        let p = RetryPolicy {
            max_retries: 2,
            backoff_step: Duration::from_millis(10),
        };
        assert!(matches!(p.decide(2, true), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, true), RetryDecision::NoRetry);
    }
}
