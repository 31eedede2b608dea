use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::campaigns::StoreError;

/// Every way an issuance request can fail, in the order the checks run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IssuanceError {
    #[error("No authenticated store session")]
    InvalidSession,

    #[error("Challenge token is missing, invalid or expired")]
    InvalidChallengeToken,

    #[error("Too many discount requests, retry after {reset_at}")]
    RateLimited {
        reset_at: DateTime<Utc>,
        remaining: u32,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Campaign {0} not found")]
    CampaignNotFound(String),

    #[error("Campaign {0} is not active")]
    CampaignInactive(String),

    #[error("Discounts are disabled for campaign {0}")]
    DiscountDisabled(String),

    #[error("Discount could not be issued: {0}")]
    DiscountIssuanceFailed(String),
}

impl IssuanceError {
    /// Stable machine-readable code used in error responses and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            IssuanceError::InvalidSession => "invalid_session",
            IssuanceError::InvalidChallengeToken => "invalid_challenge_token",
            IssuanceError::RateLimited { .. } => "rate_limited",
            IssuanceError::InvalidRequest(_) => "invalid_request",
            IssuanceError::CampaignNotFound(_) => "campaign_not_found",
            IssuanceError::CampaignInactive(_) => "campaign_inactive",
            IssuanceError::DiscountDisabled(_) => "discount_disabled",
            IssuanceError::DiscountIssuanceFailed(_) => "discount_issuance_failed",
        }
    }

    /// Whether the same request may succeed when sent again unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IssuanceError::RateLimited { .. } | IssuanceError::DiscountIssuanceFailed(_)
        )
    }
}

impl From<StoreError> for IssuanceError {
    fn from(err: StoreError) -> Self {
        IssuanceError::DiscountIssuanceFailed(err.to_string())
    }
}
