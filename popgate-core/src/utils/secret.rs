//! Secret strings for store tokens and signing keys
//!
//! `MaskedSecret` keeps the value in a `secrecy::SecretString` (zeroized on
//! drop) and only prints a partially masked form in `Debug` and `Display`.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::sensitive_data::mask_sensitive_value;

/// # Example
/// ```
/// use popgate_core::utils::secret::MaskedSecret;
///
/// let token = MaskedSecret::new("shpat-admin-token-1234".to_string());
/// assert_eq!(format!("{:?}", token), "\"*****-*****-*****-1234\"");
/// assert_eq!(token.expose_secret(), "shpat-admin-token-1234");
/// ```
#[derive(Clone)]
pub struct MaskedSecret(SecretString);

impl MaskedSecret {
    pub fn new(value: String) -> Self {
        Self(SecretString::new(value.into_boxed_str()))
    }

    /// Raw value, for outbound headers and signatures only
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }
}

impl From<&str> for MaskedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl std::fmt::Debug for MaskedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", mask_sensitive_value(self.0.expose_secret()))
    }
}

impl std::fmt::Display for MaskedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", mask_sensitive_value(self.0.expose_secret()))
    }
}

impl Serialize for MaskedSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Never write the raw value back out, e.g. via `popgate config`
        mask_sensitive_value(self.0.expose_secret()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MaskedSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(MaskedSecret::new(value))
    }
}

impl PartialEq for MaskedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Eq for MaskedSecret {}
