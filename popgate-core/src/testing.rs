//! In-memory collaborators for exercising the issuance service without a
//! commerce platform. Enabled for tests and behind the `test-utils` feature.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Barrier;

use crate::{
    discounts::{
        ChallengeValidator, CommerceError, CreateCodeParams, CreatedCode, DiscountClient,
        RateLimitDecision, RateLimiter,
    },
    session::StoreSession,
};

/// Discount client that hands out `GEN1`, `GEN2`, ... and records every call.
#[derive(Default)]
pub struct RecordingDiscountClient {
    calls: Mutex<Vec<CreateCodeParams>>,
    counter: AtomicUsize,
    failing: AtomicBool,
    barrier: Option<Barrier>,
}

impl RecordingDiscountClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits until `parties` calls are in flight.
    pub fn with_barrier(parties: usize) -> Self {
        Self {
            barrier: Some(Barrier::new(parties)),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CreateCodeParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DiscountClient for RecordingDiscountClient {
    async fn create_code(
        &self,
        _session: &StoreSession,
        params: &CreateCodeParams,
    ) -> Result<CreatedCode, CommerceError> {
        self.calls.lock().unwrap().push(params.clone());
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CommerceError::Rejected(vec![
                "Code creation disabled".to_string()
            ]));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CreatedCode {
            code: format!("GEN{n}"),
            discount_id: format!("gid://shopify/DiscountCodeNode/{n}"),
        })
    }
}

/// Rate limiter with a fixed answer that remembers the keys it saw.
pub struct FixedRateLimiter {
    allowed: bool,
    keys: Mutex<Vec<String>>,
}

impl FixedRateLimiter {
    pub fn allowing() -> Self {
        Self {
            allowed: true,
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            allowed: false,
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateLimiter for FixedRateLimiter {
    async fn check_rate_limit(&self, key: &str) -> RateLimitDecision {
        self.keys.lock().unwrap().push(key.to_string());
        RateLimitDecision {
            allowed: self.allowed,
            remaining: if self.allowed { 9 } else { 0 },
            reset_at: Utc::now() + Duration::seconds(60),
        }
    }
}

/// Accepts exactly one token, for any session.
pub struct StaticChallengeValidator {
    accepted: String,
}

impl StaticChallengeValidator {
    pub fn accepting(token: &str) -> Self {
        Self {
            accepted: token.to_string(),
        }
    }
}

#[async_trait]
impl ChallengeValidator for StaticChallengeValidator {
    async fn validate(&self, token: &str, _session_id: &str) -> bool {
        token == self.accepted
    }
}
