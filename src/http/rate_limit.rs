//! Proactive request throttle
//!
//! Uses the governor crate for token bucket rate limiting. The default
//! bucket matches the platform's documented allowance of 100 requests per
//! 10 seconds per user token, so a well-behaved client rarely sees a 429.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the throttle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per period (also the burst size)
    pub requests: u32,
    /// Length of the window
    pub period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            period: Duration::from_secs(10),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new throttle config
    pub fn new(requests: u32, period: Duration) -> Self {
        Self { requests, period }
    }
}

/// Token bucket throttle
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new throttle with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let requests = NonZeroU32::new(config.requests).unwrap_or(NonZeroU32::MIN);
        let replenish = config.period / requests.get();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
