use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[readonly::make]
pub struct CommerceSettings {
    /// Admin API version, part of the GraphQL endpoint path
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Replaces `https://<shop>/admin/api/<version>/graphql.json`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Code creation is not idempotent upstream, so one attempt by default
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_api_version() -> String {
    "2025-01".to_string()
}

fn default_code_prefix() -> String {
    "POP-".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_attempts() -> usize {
    1
}

impl Default for CommerceSettings {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            endpoint: None,
            code_prefix: default_code_prefix(),
            timeout_seconds: default_timeout_seconds(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl CommerceSettings {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: Some(endpoint.to_string()),
            ..Self::default()
        }
    }

    /// GraphQL endpoint for a shop
    pub fn graphql_url(&self, shop_domain: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://{}/admin/api/{}/graphql.json",
                shop_domain, self.api_version
            ),
        }
    }
}
