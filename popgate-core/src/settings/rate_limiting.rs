use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct RateLimitingValidationError {
    pub message: String,
}

impl std::fmt::Display for RateLimitingValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rate limiting configuration error: {}", self.message)
    }
}

impl std::error::Error for RateLimitingValidationError {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimitingConfig {
    /// Global switch for all request-level limits and the issuance limiter
    #[serde(default)]
    pub enabled: bool,

    /// Storefront routes, keyed by client IP
    #[serde(default)]
    pub storefront: TierConfig,

    /// Campaign configuration routes, keyed by bearer token
    #[serde(default)]
    pub campaigns: TierConfig,

    /// Discount issuance attempts, keyed by campaign and shopper
    #[serde(default)]
    pub issuance: TierConfig,
}

impl RateLimitingConfig {
    pub fn validate(&self) -> Result<(), RateLimitingValidationError> {
        if !self.enabled {
            return Ok(());
        }

        for (name, tier) in [
            ("storefront", &self.storefront),
            ("campaigns", &self.campaigns),
            ("issuance", &self.issuance),
        ] {
            tier.validate().map_err(|e| RateLimitingValidationError {
                message: format!("{}: {}", name, e.message),
            })?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TierConfig {
    #[serde(default)]
    pub requests_per_minute: u64,

    /// Requests allowed back to back before the per-minute rate applies
    #[serde(default)]
    pub burst_size: u32,
}

impl TierConfig {
    /// A tier with `requests_per_minute = 0` is disabled
    pub fn is_enabled(&self) -> bool {
        self.requests_per_minute > 0
    }

    pub fn validate(&self) -> Result<(), RateLimitingValidationError> {
        if self.requests_per_minute == 0 && self.burst_size > 0 {
            return Err(RateLimitingValidationError {
                message: "burst_size must be 0 when requests_per_minute is 0".to_string(),
            });
        }

        if self.requests_per_minute > 0 && self.burst_size == 0 {
            return Err(RateLimitingValidationError {
                message: "burst_size must be greater than 0 when rate limiting is enabled"
                    .to_string(),
            });
        }

        if self.burst_size as u64 > self.requests_per_minute {
            return Err(RateLimitingValidationError {
                message: format!(
                    "burst_size ({}) should not exceed requests_per_minute ({})",
                    self.burst_size, self.requests_per_minute
                ),
            });
        }

        Ok(())
    }
}
