//! Request-level rate limiting for the HTTP surface
//!
//! - Storefront routes are limited per client IP
//! - Campaign configuration routes are limited per bearer token
//!
//! Per-shopper issuance limits live in [`crate::limiter`].

pub mod extractors;
pub mod metrics;
pub mod middleware;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use extractors::BearerTokenExtractor;
use governor::middleware::NoOpMiddleware;
use popgate_core::settings::rate_limiting::TierConfig;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::{KeyExtractor, SmartIpKeyExtractor};
use tower_governor::GovernorLayer;

/// Time to replenish one request for the tier.
fn replenish_period(config: &TierConfig) -> Duration {
    let per_request_ms = 60_000 / std::cmp::max(1, config.requests_per_minute);
    Duration::from_millis(std::cmp::max(1, per_request_ms))
}

fn create_limiter<K>(
    config: &TierConfig,
    key_extractor: K,
) -> anyhow::Result<GovernorLayer<K, NoOpMiddleware, axum::body::Body>>
where
    K: KeyExtractor,
{
    let governor_config = GovernorConfigBuilder::default()
        .period(replenish_period(config))
        .burst_size(config.burst_size)
        .key_extractor(key_extractor)
        .finish()
        .ok_or_else(|| anyhow!("Invalid rate limit config: {:?}", config))?;

    Ok(GovernorLayer::new(Arc::new(governor_config)))
}

/// Limit storefront routes by client IP (honours `X-Forwarded-For`).
pub fn create_storefront_limiter(
    config: &TierConfig,
) -> anyhow::Result<GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware, axum::body::Body>> {
    create_limiter(config, SmartIpKeyExtractor)
}

/// Limit campaign configuration routes by bearer token.
pub fn create_campaigns_limiter(
    config: &TierConfig,
) -> anyhow::Result<GovernorLayer<BearerTokenExtractor, NoOpMiddleware, axum::body::Body>> {
    create_limiter(config, BearerTokenExtractor)
}
