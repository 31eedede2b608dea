//! Per-shopper limit on discount issuance attempts.
//!
//! Backed by a keyed GCRA limiter; keys are built by the issuance service
//! from the campaign and the shopper's email or session.

use std::num::NonZeroU32;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use popgate_core::{
    discounts::{RateLimitDecision, RateLimiter as IssuanceRateLimiter},
    settings::rate_limiting::{RateLimitingConfig, TierConfig},
};
use tracing::debug;

type KeyedLimiter = RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    DefaultClock,
    StateInformationMiddleware,
>;

struct ActiveLimiter {
    limiter: KeyedLimiter,
    burst: u32,
    replenish: StdDuration,
}

/// Issuance limiter; allows everything when the `issuance` tier is off.
pub struct IssuanceLimiter {
    inner: Option<ActiveLimiter>,
}

impl IssuanceLimiter {
    pub fn new(config: &RateLimitingConfig) -> Self {
        let inner = if config.enabled {
            Self::build(&config.issuance)
        } else {
            None
        };
        if inner.is_none() {
            debug!("Issuance rate limiting is disabled");
        }
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    fn build(tier: &TierConfig) -> Option<ActiveLimiter> {
        if !tier.is_enabled() {
            return None;
        }
        let per_minute = u32::try_from(tier.requests_per_minute).unwrap_or(u32::MAX);
        let rate = NonZeroU32::new(per_minute)?;
        let burst = NonZeroU32::new(tier.burst_size).unwrap_or(rate);
        let quota = Quota::per_minute(rate).allow_burst(burst);

        Some(ActiveLimiter {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            burst: burst.get(),
            replenish: quota.replenish_interval(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Drop keys whose buckets are full again.
    pub fn retain_recent(&self) {
        if let Some(active) = &self.inner {
            active.limiter.retain_recent();
            active.limiter.shrink_to_fit();
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.inner.as_ref().map(|a| a.limiter.len()).unwrap_or(0)
    }

    fn decide(&self, key: &str) -> RateLimitDecision {
        let now = Utc::now();
        let Some(active) = &self.inner else {
            return RateLimitDecision {
                allowed: true,
                remaining: u32::MAX,
                reset_at: now,
            };
        };

        match active.limiter.check_key(&key.to_string()) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                let used = active.burst.saturating_sub(remaining);
                RateLimitDecision {
                    allowed: true,
                    remaining,
                    reset_at: now + to_chrono(active.replenish * used),
                }
            }
            Err(not_until) => {
                let wait = not_until.wait_time_from(active.limiter.clock().now());
                debug!(key, wait_ms = wait.as_millis() as u64, "Issuance rate limited");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: now + to_chrono(wait),
                }
            }
        }
    }
}

fn to_chrono(duration: StdDuration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::seconds(60))
}

#[async_trait]
impl IssuanceRateLimiter for IssuanceLimiter {
    async fn check_rate_limit(&self, key: &str) -> RateLimitDecision {
        self.decide(key)
    }
}
