use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff with jitter for transient fetch failures.
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub jitter: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_attempts: config.max_attempts.max(1),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1)
    /// plus a uniform random slice of the jitter range.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exp);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
