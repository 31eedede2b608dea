pub mod commerce;
pub mod error;
pub mod guards;
pub mod issuance;
pub mod message;

pub use commerce::{CommerceError, CreateCodeParams, CreatedCode, DiscountClient, EmailLock};
pub use error::IssuanceError;
pub use guards::{ChallengeValidator, RateLimitDecision, RateLimiter};
pub use issuance::{CodeOutcome, DiscountIssuanceService, IssuanceRequest, IssuanceResult};
