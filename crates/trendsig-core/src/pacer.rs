//! Request pacing for provider calls.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces provider calls so at most one starts per configured interval.
///
/// A zero interval disables pacing entirely; scans against a warm store
/// should not wait on a limiter they will never hit.
pub struct ProviderPacer {
    limiter: Option<DirectLimiter>,
}

impl ProviderPacer {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = if min_interval.is_zero() {
            None
        } else {
            let quota = Quota::with_period(min_interval)
                .map(|q| q.allow_burst(NonZeroU32::MIN));
            quota.map(RateLimiter::direct)
        };
        Self { limiter }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    /// Wait until the next provider call is allowed to start.
    pub async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
