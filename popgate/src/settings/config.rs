use config::{Config, ConfigError, Environment, File};
use popgate_core::settings::{
    api_server::ApiServer, challenge::ChallengeSettings, commerce::CommerceSettings,
    discounts::DiscountSettings,
};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[readonly::make]
pub struct CampaignSeedSettings {
    /// Every `*.yaml` / `*.yml` file in here holds one campaign
    pub folder: String,
}

impl Default for CampaignSeedSettings {
    fn default() -> Self {
        CampaignSeedSettings {
            folder: "config/campaigns".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[allow(unused)]
pub struct Settings {
    #[serde(default)]
    pub debug: bool,
    pub telemetry: Option<String>,
    pub api: ApiServer,
    #[serde(default)]
    pub commerce: CommerceSettings,
    pub challenge: ChallengeSettings,
    #[serde(default)]
    pub discounts: DiscountSettings,
    #[serde(default)]
    pub campaigns: CampaignSeedSettings,
}

impl Settings {
    pub fn get_environment() -> Environment {
        Environment::default()
            .prefix("POPGATE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("POPGATE_RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("api.bind_address", "0.0.0.0:21380")?
            .set_default("api.max_body_size", "64K")?
            .set_default("campaigns.folder", "config/campaigns")?
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Self::get_environment());

        Self::from_config(builder.build()?)
    }

    /// Deserialize and validate an already layered configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;

        // Telemetry can be switched off from the environment even when the
        // config file enables it.
        settings.telemetry = settings.check_if_optional(&settings.telemetry);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate().map_err(ConfigError::Message)?;
        self.challenge.validate().map_err(ConfigError::Message)?;
        if self.commerce.code_prefix.trim().is_empty() {
            return Err(ConfigError::Message(
                "commerce.code_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn telemetry_includes(&self, signal: &str) -> bool {
        self.telemetry
            .as_ref()
            .map(|t| t.to_lowercase().split(',').any(|s| s.trim() == signal))
            .unwrap_or(false)
    }

    fn check_if_optional(&self, s: &Option<String>) -> Option<String> {
        match s {
            None => None,
            Some(s) => match s.to_lowercase().as_str() {
                "no" | "false" | "0" | "" => None,
                _ => Some(s.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popgate_core::settings::discounts::CacheWriteMode;

    fn load(file: &str) -> Result<Settings, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(file))
            .build()?;
        Settings::from_config(config)
    }

    #[test]
    fn test_load_test_config() {
        let settings = load("tests/test_config").unwrap();
        assert_eq!(settings.api.stores.len(), 2);
        assert_eq!(settings.challenge.ttl_seconds, 300);
        assert_eq!(settings.discounts.cache_write, CacheWriteMode::CompareAndSwap);
        assert_eq!(settings.commerce.code_prefix, "POP-");
        assert!(settings.telemetry.is_none());

        let session = settings.api.session_for("demo-store").unwrap();
        assert_eq!(session.shop_domain, "demo-store.myshopify.com");
    }

    #[test]
    fn test_short_challenge_secret_is_rejected() {
        let config = Config::builder()
            .add_source(config::File::with_name("tests/test_config"))
            .set_override("challenge.secret", "too-short")
            .unwrap()
            .build()
            .unwrap();
        let err = Settings::from_config(config).unwrap_err();
        assert!(err.to_string().contains("challenge.secret"));
    }

    #[test]
    fn test_telemetry_can_be_disabled() {
        let config = Config::builder()
            .add_source(config::File::with_name("tests/test_config"))
            .set_override("telemetry", "false")
            .unwrap()
            .build()
            .unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert!(settings.telemetry.is_none());

        let config = Config::builder()
            .add_source(config::File::with_name("tests/test_config"))
            .set_override("telemetry", "traces,metrics")
            .unwrap()
            .build()
            .unwrap();
        let settings = Settings::from_config(config).unwrap();
        assert!(settings.telemetry_includes("traces"));
        assert!(settings.telemetry_includes("metrics"));
    }

    #[test]
    fn test_environment_overrides_store_token() {
        env::set_var(
            "POPGATE__API__STORES__OUTLET__STOREFRONT_TOKEN",
            "outlet-token-from-env",
        );
        let config = Config::builder()
            .add_source(config::File::with_name("tests/test_config"))
            .add_source(Settings::get_environment())
            .build()
            .unwrap();
        env::remove_var("POPGATE__API__STORES__OUTLET__STOREFRONT_TOKEN");

        let settings = Settings::from_config(config).unwrap();
        assert_eq!(
            settings.api.stores["outlet"].storefront_token.expose_secret(),
            "outlet-token-from-env"
        );
    }
}
