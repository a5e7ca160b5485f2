//! HTTP execution module
//!
//! Provides the request executor with retry, throttling, and backoff.
//!
//! # Features
//!
//! - **Attempt loop**: 401 delegation to the auth strategy, retries for
//!   rate limits, timeouts, server and connection errors
//! - **Throttle**: token bucket rate limiter using governor
//! - **Backoff**: exponential with jitter; `Retry-After` wins on 429
//! - **Legacy XML**: envelope building and `errcode` checking

mod client;
mod rate_limit;
mod request;
mod retry;
pub mod xml;

pub use client::{looks_like_dbid, RequestExecutor};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::{ApiRequest, RequestContext};
pub use retry::{RetryPolicy, JITTER};
