//! Shared outbound pacing for the detail API.
//!
//! [`ApiRateLimiter`] enforces one minimum interval between calls across
//! every caller holding the same `Arc`. [`RetryPolicy`] bounds how often a
//! throttled call is re-issued and how long to wait between attempts.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};

/// Minimum-interval limiter shared by the backfill and lazy-fetch paths.
pub struct ApiRateLimiter {
    inner: Option<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl ApiRateLimiter {
    /// Allow at most one call per `min_interval`. A zero interval disables
    /// pacing.
    pub fn new(min_interval: Duration) -> Self {
        // Burst of one: calls are spaced, never bunched.
        let inner = Quota::with_period(min_interval)
            .map(|q| q.allow_burst(NonZeroU32::MIN))
            .map(RateLimiter::direct);
        Self { inner }
    }

    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Wait until the next call slot is available.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}

/// Bounded retry with exponential backoff for throttled calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub const fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Whether another attempt is allowed after `retries` retries so far.
    pub fn allows_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// Wait before retry number `retry` (0-based): `initial * 2^retry`,
    /// capped at `max_backoff`. A server `Retry-After` hint wins when longer.
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let backoff = self
            .initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff);
        match retry_after {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
