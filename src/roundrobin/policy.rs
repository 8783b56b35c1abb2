// src/roundrobin/policy.rs

use std::time::Duration;

use crate::llm::LlmError;

/// How hard to try before a turn counts as failed, and how many failed
/// turns in a row get a seat benched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
    pub bench_after: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(60),
            bench_after: 2,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }

    pub fn should_retry(&self, attempt: u32, err: &LlmError) -> bool {
        attempt < self.max_attempts && err.is_retryable()
    }

    pub fn should_bench(&self, consecutive_failures: u32) -> bool {
        self.bench_after > 0 && consecutive_failures >= self.bench_after
    }
}
