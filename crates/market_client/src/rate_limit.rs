//! Outgoing request budget for the market-data API.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Single token bucket shared by every request a client makes.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    limiter: Arc<DirectLimiter>,
    per_sec: NonZeroU32,
}

impl RequestLimiter {
    /// A zero budget is treated as one request per second.
    pub fn per_second(requests: u32) -> Self {
        let per_sec = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_sec))),
            per_sec,
        }
    }

    pub fn requests_per_sec(&self) -> u32 {
        self.per_sec.get()
    }

    /// Wait until a request slot is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a slot without waiting. Returns true if acquired.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::per_second(5)
    }
}
