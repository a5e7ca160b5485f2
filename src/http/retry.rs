//! Retry policy and backoff computation

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Fractional jitter applied to every computed delay (±10%)
pub const JITTER: f64 = 0.1;

/// Resolved retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Exponential growth factor
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    /// Delay after `attempt` (1-based) failed, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, 1.0)
    }

    /// `min(initial * multiplier^(attempt-1) * jitter_factor, max)`
    pub fn delay_with_jitter(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent) * jitter_factor;
        let capped = secs.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// Backoff delay with a uniformly drawn jitter factor in `[0.9, 1.1]`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
        self.delay_with_jitter(attempt, factor)
    }

    /// Delay after a 429: the provider's Retry-After wins over computed backoff
    pub fn rate_limit_delay(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self.calculate_backoff(attempt),
        }
    }
}
