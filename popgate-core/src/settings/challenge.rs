use serde::{Deserialize, Serialize};

use crate::utils::secret::MaskedSecret;

/// Shortest accepted HMAC key, in bytes
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[readonly::make]
pub struct ChallengeSettings {
    pub secret: MaskedSecret,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    300
}

impl ChallengeSettings {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            secret: MaskedSecret::from(secret),
            ttl_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "challenge.secret must be at least {MIN_SECRET_LEN} bytes long"
            ));
        }
        if self.ttl_seconds == 0 {
            return Err("challenge.ttl_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ChallengeSettings::new("short", 300).validate().is_err());
        let long = "k".repeat(MIN_SECRET_LEN);
        assert!(ChallengeSettings::new(&long, 300).validate().is_ok());
        assert!(ChallengeSettings::new(&long, 0).validate().is_err());
    }
}
