//! Anti-abuse checks that run before any campaign state is read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one attempt for `key` and report whether it is allowed.
    async fn check_rate_limit(&self, key: &str) -> RateLimitDecision;
}

#[async_trait]
pub trait ChallengeValidator: Send + Sync {
    /// True when `token` is authentic, unexpired and bound to `session_id`.
    async fn validate(&self, token: &str, session_id: &str) -> bool;
}
