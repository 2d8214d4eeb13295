use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::carrier::{CarrierError, CarrierId};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget for one carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierQuota {
    pub window: Duration,
    pub limit: u32,
}

impl Default for CarrierQuota {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            limit: 120,
        }
    }
}

/// Outbound request budget guarding a single carrier.
///
/// Exhaustion is reported immediately as [`CarrierError::rate_limited`]; the
/// caller's fallback policy decides what happens next.
pub struct CarrierThrottle {
    carrier: CarrierId,
    limiter: DirectRateLimiter,
}

impl CarrierThrottle {
    pub fn new(carrier: CarrierId, quota: CarrierQuota) -> Self {
        Self {
            carrier,
            limiter: RateLimiter::direct(quota_from_window(quota.window, quota.limit)),
        }
    }

    pub fn acquire(&self) -> Result<(), CarrierError> {
        self.limiter.check().map_err(|_| {
            warn!(carrier = %self.carrier, "carrier request budget exhausted");
            CarrierError::rate_limited(
                self.carrier,
                format!("{} request budget exhausted", self.carrier),
            )
        })
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
