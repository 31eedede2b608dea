use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::rate_limiting::RateLimitingConfig;
use crate::{session::StoreSession, utils::secret::MaskedSecret};

/// Credentials of one storefront.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSettings {
    pub shop_domain: String,
    /// Bearer token the storefront popup script and app proxy present
    pub storefront_token: MaskedSecret,
    /// Token for the commerce platform's admin API
    pub admin_access_token: MaskedSecret,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[allow(unused)]
#[readonly::make]
pub struct ApiServer {
    pub bind_address: String,
    #[serde(deserialize_with = "deserialize_bytes")]
    pub max_body_size: usize,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub stores: HashMap<String, StoreSettings>,
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

impl Default for ApiServer {
    fn default() -> Self {
        ApiServer {
            bind_address: "0.0.0.0:21380".to_string(),
            max_body_size: 64 * 1024,
            cors_allowed_origins: Vec::new(),
            stores: HashMap::new(),
            rate_limiting: RateLimitingConfig::default(),
        }
    }
}

impl ApiServer {
    pub fn validate(&self) -> Result<(), String> {
        self.rate_limiting.validate().map_err(|e| e.to_string())?;

        let mut seen: Vec<&str> = Vec::new();
        for (store_id, store) in &self.stores {
            if store.storefront_token.is_empty() {
                return Err(format!("api.stores.{store_id}.storefront_token is empty"));
            }
            if store.shop_domain.trim().is_empty() {
                return Err(format!("api.stores.{store_id}.shop_domain is empty"));
            }
            let token = store.storefront_token.expose_secret();
            if seen.contains(&token) {
                return Err(format!(
                    "api.stores.{store_id}.storefront_token is shared with another store"
                ));
            }
            seen.push(token);
        }
        Ok(())
    }

    /// Session for a configured store id.
    pub fn session_for(&self, store_id: &str) -> Option<StoreSession> {
        self.stores.get(store_id).map(|store| {
            StoreSession::new(
                store_id,
                &store.shop_domain,
                store.admin_access_token.clone(),
            )
        })
    }
}

/// Accepts plain byte counts or a `K`/`M`/`G` suffix, e.g. `64K`.
fn deserialize_bytes<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    let s = match Size::deserialize(deserializer)? {
        Size::Number(n) => return Ok(n),
        Size::Text(s) => s.trim().to_uppercase(),
    };

    let (num_part, multiplier) = match s.chars().last() {
        Some('G') => (&s[..s.len() - 1], 1_024 * 1_024 * 1_024),
        Some('M') => (&s[..s.len() - 1], 1_024 * 1_024),
        Some('K') => (&s[..s.len() - 1], 1_024),
        _ => (s.as_str(), 1),
    };

    let num: usize = num_part.trim().parse().map_err(serde::de::Error::custom)?;
    Ok(num * multiplier)
}
