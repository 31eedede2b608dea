use async_trait::async_trait;
use thiserror::Error;

use crate::{campaigns::RewardValue, http::RetryError, session::StoreSession};

/// Restricts redemption of a code to one customer email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailLock {
    pub authorized_email: String,
    pub require_email_match: bool,
}

impl EmailLock {
    pub fn for_email(email: &str) -> Self {
        Self {
            authorized_email: email.trim().to_string(),
            require_email_match: true,
        }
    }
}

/// Everything the commerce platform needs to create one code.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCodeParams {
    pub campaign_id: String,
    pub title: String,
    pub reward: RewardValue,
    /// Tier the code is created for, used to tag the generated code
    pub tier: Option<usize>,
    pub expiry_days: Option<u32>,
    pub minimum_amount_cents: Option<u64>,
    pub usage_limit: Option<u32>,
    pub email_lock: Option<EmailLock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCode {
    pub code: String,
    pub discount_id: String,
}

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error(transparent)]
    Http(#[from] RetryError),

    #[error("Commerce platform rejected the discount: {}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("Unexpected commerce platform response: {0}")]
    InvalidResponse(String),

    #[error("Commerce client is misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait DiscountClient: Send + Sync {
    async fn create_code(
        &self,
        session: &StoreSession,
        params: &CreateCodeParams,
    ) -> Result<CreatedCode, CommerceError>;
}
