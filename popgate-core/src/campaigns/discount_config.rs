use popgate_types::DeliveryMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tier::DiscountTier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid discount configuration: {0}")]
pub struct ConfigValidationError(pub String);

/// A discount code known to exist on the commerce platform.
///
/// Merchant-entered codes have no `discount_id`. In configuration files a
/// plain string is accepted as shorthand for a code without id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "CachedCodeRepr")]
pub struct CachedCode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CachedCodeRepr {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    Full {
        code: String,
        #[serde(default)]
        discount_id: Option<String>,
    },
}

impl From<CachedCodeRepr> for CachedCode {
    fn from(repr: CachedCodeRepr) -> Self {
        match repr {
            CachedCodeRepr::Plain(code) => CachedCode {
                code,
                discount_id: None,
            },
            CachedCodeRepr::Full { code, discount_id } => CachedCode { code, discount_id },
        }
    }
}

impl CachedCode {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            discount_id: None,
        }
    }

    pub fn with_discount_id(code: &str, discount_id: &str) -> Self {
        Self {
            code: code.to_string(),
            discount_id: Some(discount_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// One code reused by every shopper of the campaign (per tier)
    #[default]
    Shared,
    /// One code per shopper identity, redeemable once
    SingleUse,
}

/// What the shopper gets, keyed on `valueType`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "valueType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountReward {
    Percentage {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<CachedCode>,
    },
    /// `value` is in major currency units
    FixedAmount {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<CachedCode>,
    },
    FreeShipping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<CachedCode>,
    },
    Tiered { tiers: Vec<DiscountTier> },
}

/// The concrete value a single code is created with, after tier resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewardValue {
    Percentage(f64),
    FixedAmount(f64),
    FreeShipping,
}

impl DiscountReward {
    pub fn value_type(&self) -> &'static str {
        match self {
            DiscountReward::Percentage { .. } => "PERCENTAGE",
            DiscountReward::FixedAmount { .. } => "FIXED_AMOUNT",
            DiscountReward::FreeShipping { .. } => "FREE_SHIPPING",
            DiscountReward::Tiered { .. } => "TIERED",
        }
    }

    pub fn is_tiered(&self) -> bool {
        matches!(self, DiscountReward::Tiered { .. })
    }

    /// Value of the non-tiered reward, `None` for tiered configs
    pub fn flat_value(&self) -> Option<RewardValue> {
        match self {
            DiscountReward::Percentage { value, .. } => Some(RewardValue::Percentage(*value)),
            DiscountReward::FixedAmount { value, .. } => Some(RewardValue::FixedAmount(*value)),
            DiscountReward::FreeShipping { .. } => Some(RewardValue::FreeShipping),
            DiscountReward::Tiered { .. } => None,
        }
    }

    pub fn shared_code(&self) -> Option<&CachedCode> {
        match self {
            DiscountReward::Percentage { code, .. }
            | DiscountReward::FixedAmount { code, .. }
            | DiscountReward::FreeShipping { code } => code.as_ref(),
            DiscountReward::Tiered { .. } => None,
        }
    }

    pub(crate) fn shared_code_mut(&mut self) -> Option<&mut Option<CachedCode>> {
        match self {
            DiscountReward::Percentage { code, .. }
            | DiscountReward::FixedAmount { code, .. }
            | DiscountReward::FreeShipping { code } => Some(code),
            DiscountReward::Tiered { .. } => None,
        }
    }

    pub fn tiers(&self) -> Option<&[DiscountTier]> {
        match self {
            DiscountReward::Tiered { tiers } => Some(tiers),
            _ => None,
        }
    }

    pub(crate) fn tiers_mut(&mut self) -> Option<&mut Vec<DiscountTier>> {
        match self {
            DiscountReward::Tiered { tiers } => Some(tiers),
            _ => None,
        }
    }

    /// Copy of the reward with every cached code removed
    fn terms(&self) -> DiscountReward {
        let mut terms = self.clone();
        if let Some(code) = terms.shared_code_mut() {
            *code = None;
        }
        if let Some(tiers) = terms.tiers_mut() {
            for tier in tiers.iter_mut() {
                tier.code = None;
            }
        }
        terms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscountConfig {
    pub enabled: bool,
    #[serde(default)]
    pub kind: DiscountKind,
    pub reward: DiscountReward,
    #[serde(default)]
    pub delivery_mode: DeliveryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_amount_cents: Option<u64>,
}

impl DiscountConfig {
    /// Check the invariants the issuance path relies on.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match &self.reward {
            DiscountReward::Percentage { value, .. } => validate_percentage(*value)?,
            DiscountReward::FixedAmount { value, .. } => {
                if !value.is_finite() || *value <= 0.0 {
                    return Err(ConfigValidationError(format!(
                        "fixed amount must be greater than 0, got {value}"
                    )));
                }
            }
            DiscountReward::FreeShipping { .. } => {}
            DiscountReward::Tiered { tiers } => validate_tiers(tiers)?,
        }

        if self.kind == DiscountKind::SingleUse {
            let has_shared_code = self.reward.shared_code().is_some()
                || self
                    .reward
                    .tiers()
                    .is_some_and(|tiers| tiers.iter().any(|t| t.code.is_some()));
            if has_shared_code {
                return Err(ConfigValidationError(
                    "single-use discounts cannot carry a pre-set shared code".to_string(),
                ));
            }
        }

        if self.expiry_days == Some(0) {
            return Err(ConfigValidationError(
                "expiry_days must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// True when both configs grant the same discount, ignoring cached codes.
    pub fn same_terms(&self, other: &DiscountConfig) -> bool {
        self.kind == other.kind
            && self.expiry_days == other.expiry_days
            && self.minimum_amount_cents == other.minimum_amount_cents
            && self.reward.terms() == other.reward.terms()
    }

    /// Fill the cache slots that are empty in `self` from `previous`.
    pub fn inherit_codes(&mut self, previous: &DiscountConfig) {
        if let (Some(slot), Some(old)) = (self.reward.shared_code_mut(), previous.reward.shared_code()) {
            if slot.is_none() {
                *slot = Some(old.clone());
            }
        }
        if let (Some(tiers), Some(old_tiers)) = (self.reward.tiers_mut(), previous.reward.tiers()) {
            for (tier, old) in tiers.iter_mut().zip(old_tiers) {
                if tier.code.is_none() {
                    tier.code = old.code.clone();
                }
            }
        }
    }
}

fn validate_percentage(value: f64) -> Result<(), ConfigValidationError> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(ConfigValidationError(format!(
            "percentage must be within (0, 100], got {value}"
        )));
    }
    Ok(())
}

fn validate_tiers(tiers: &[DiscountTier]) -> Result<(), ConfigValidationError> {
    let first = tiers.first().ok_or_else(|| {
        ConfigValidationError("tiered discounts need at least one tier".to_string())
    })?;
    if first.min_subtotal_cents != 0 {
        return Err(ConfigValidationError(format!(
            "tier 0 must start at a subtotal of 0, got {}",
            first.min_subtotal_cents
        )));
    }
    for (index, pair) in tiers.windows(2).enumerate() {
        if pair[1].min_subtotal_cents <= pair[0].min_subtotal_cents {
            return Err(ConfigValidationError(format!(
                "tier {} threshold {} must be greater than tier {} threshold {}",
                index + 1,
                pair[1].min_subtotal_cents,
                index,
                pair[0].min_subtotal_cents
            )));
        }
    }
    for tier in tiers {
        validate_percentage(tier.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage_config(value: f64) -> DiscountConfig {
        DiscountConfig {
            enabled: true,
            kind: DiscountKind::Shared,
            reward: DiscountReward::Percentage { value, code: None },
            delivery_mode: DeliveryMode::ShowCode,
            expiry_days: Some(30),
            minimum_amount_cents: None,
        }
    }

    fn tiered_config(tiers: Vec<DiscountTier>) -> DiscountConfig {
        DiscountConfig {
            reward: DiscountReward::Tiered { tiers },
            ..percentage_config(10.0)
        }
    }

    #[test]
    fn test_deserialize_from_yaml_with_plain_code() {
        let yaml = r#"
enabled: true
kind: SHARED
deliveryMode: show_code
reward:
  valueType: PERCENTAGE
  value: 15
  code: BUNDLE15
"#;
        let config: DiscountConfig = serde_norway::from_str(yaml).unwrap();
        assert_eq!(
            config.reward.shared_code(),
            Some(&CachedCode::new("BUNDLE15"))
        );
        assert_eq!(config.reward.flat_value(), Some(RewardValue::Percentage(15.0)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_tiered_json() {
        let json = serde_json::json!({
            "enabled": true,
            "reward": {
                "valueType": "TIERED",
                "tiers": [
                    {"minSubtotalCents": 0, "value": 10},
                    {"minSubtotalCents": 5000, "value": 15, "code": {"code": "SAVE15", "discountId": "gid://1"}}
                ]
            },
            "deliveryMode": "show_in_popup_authorized_only"
        });
        let config: DiscountConfig = serde_json::from_value(json).unwrap();
        let tiers = config.reward.tiers().unwrap();
        assert_eq!(tiers.len(), 2);
        assert_eq!(
            tiers[1].code,
            Some(CachedCode::with_discount_id("SAVE15", "gid://1"))
        );
        assert!(config.delivery_mode.is_email_locked());
        assert_eq!(config.kind, DiscountKind::Shared);
    }

    #[test]
    fn test_serialize_round_trips_value_type_tag() {
        let config = percentage_config(10.0);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["reward"]["valueType"], "PERCENTAGE");
        assert_eq!(value["deliveryMode"], "show_code");
        assert!(value["reward"].get("code").is_none());
    }

    #[test]
    fn test_validate_rejects_out_of_range_percentage() {
        assert!(percentage_config(0.0).validate().is_err());
        assert!(percentage_config(101.0).validate().is_err());
        assert!(percentage_config(100.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tier_zero_with_threshold() {
        let config = tiered_config(vec![DiscountTier::new(100, 10.0)]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tier 0"));
    }

    #[test]
    fn test_validate_rejects_non_ascending_tiers() {
        let config = tiered_config(vec![
            DiscountTier::new(0, 10.0),
            DiscountTier::new(5000, 15.0),
            DiscountTier::new(5000, 20.0),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_tiers() {
        assert!(tiered_config(vec![]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_single_use_with_shared_code() {
        let config = DiscountConfig {
            kind: DiscountKind::SingleUse,
            reward: DiscountReward::Percentage {
                value: 10.0,
                code: Some(CachedCode::new("SHARED")),
            },
            ..percentage_config(10.0)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_terms_ignores_codes() {
        let plain = percentage_config(10.0);
        let mut with_code = percentage_config(10.0);
        with_code.reward = DiscountReward::Percentage {
            value: 10.0,
            code: Some(CachedCode::new("SAVE10")),
        };
        assert!(plain.same_terms(&with_code));
        assert!(!plain.same_terms(&percentage_config(15.0)));
    }

    #[test]
    fn test_inherit_codes_keeps_new_merchant_code() {
        let previous = tiered_config(vec![
            DiscountTier::new(0, 10.0).with_code("OLD10"),
            DiscountTier::new(5000, 15.0).with_code("OLD15"),
        ]);
        let mut next = tiered_config(vec![
            DiscountTier::new(0, 10.0),
            DiscountTier::new(5000, 15.0).with_code("NEW15"),
        ]);
        next.inherit_codes(&previous);
        let tiers = next.reward.tiers().unwrap();
        assert_eq!(tiers[0].code, Some(CachedCode::new("OLD10")));
        assert_eq!(tiers[1].code, Some(CachedCode::new("NEW15")));
    }
}
