use serde::{Deserialize, Serialize};

/// How a freshly created code is written back into the campaign cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheWriteMode {
    /// Write only into an empty slot; a lost race hands out the winner's code
    #[default]
    CompareAndSwap,
    /// Overwrite the slot; a lost race leaves the earlier code orphaned
    LastWriteWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[readonly::make]
pub struct DiscountSettings {
    #[serde(default)]
    pub cache_write: CacheWriteMode,
    /// Used in response messages for fixed amounts
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

impl Default for DiscountSettings {
    fn default() -> Self {
        Self {
            cache_write: CacheWriteMode::default(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

impl DiscountSettings {
    pub fn with_cache_write(cache_write: CacheWriteMode) -> Self {
        Self {
            cache_write,
            ..Self::default()
        }
    }
}
