use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    code_slot::CodeSlot,
    discount_config::{CachedCode, DiscountConfig},
    store::{StoreError, StoreOutcome, WritePrecondition},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
        };
        write!(f, "{name}")
    }
}

/// A marketing popup owned by one store, with its discount settings and the
/// codes issued for it so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub store_id: String,
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    pub discount_config: DiscountConfig,
    /// Popup design, passed through untouched
    #[serde(default)]
    pub content: serde_json::Value,
    /// Identity-bound codes, keyed by [`CodeSlot::cache_key`]
    #[serde(default)]
    pub issued_codes: BTreeMap<String, CachedCode>,
    #[serde(default)]
    pub version: u64,
    /// Bumped whenever an edit changes what the discount grants
    #[serde(default)]
    pub terms_revision: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Merchant-editable part of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDraft {
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    pub discount_config: DiscountConfig,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Campaign {
    pub fn new(id: &str, store_id: &str, draft: CampaignDraft) -> Self {
        let now = Utc::now();
        Campaign {
            id: id.to_string(),
            store_id: store_id.to_string(),
            name: draft.name,
            status: draft.status,
            discount_config: draft.discount_config,
            content: draft.content,
            issued_codes: BTreeMap::new(),
            version: 0,
            terms_revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }

    /// Apply a merchant edit.
    ///
    /// Cached codes survive only when the discount terms are unchanged;
    /// otherwise every cached code is dropped so new terms get new codes.
    pub fn apply_draft(&mut self, draft: CampaignDraft) {
        let mut config = draft.discount_config;
        if config.same_terms(&self.discount_config) {
            config.inherit_codes(&self.discount_config);
        } else {
            self.issued_codes.clear();
            self.terms_revision += 1;
        }
        self.name = draft.name;
        self.status = draft.status;
        self.discount_config = config;
        self.content = draft.content;
        self.touch();
    }

    pub fn cached_code(&self, slot: &CodeSlot) -> Option<&CachedCode> {
        match slot {
            CodeSlot::Shared { tier: None } => self.discount_config.reward.shared_code(),
            CodeSlot::Shared { tier: Some(index) } => self
                .discount_config
                .reward
                .tiers()
                .and_then(|tiers| tiers.get(*index))
                .and_then(|tier| tier.code.as_ref()),
            CodeSlot::Identity { .. } => slot
                .cache_key()
                .and_then(|key| self.issued_codes.get(&key)),
        }
    }

    /// Write `code` into `slot`.
    ///
    /// Nothing is written when the terms moved past
    /// `precondition.terms_revision`, or when the slot must be empty and
    /// already holds a code.
    pub(crate) fn write_code(
        &mut self,
        slot: &CodeSlot,
        code: CachedCode,
        precondition: WritePrecondition,
    ) -> Result<StoreOutcome, StoreError> {
        if precondition.terms_revision != self.terms_revision {
            return Ok(StoreOutcome::Stale {
                terms_revision: self.terms_revision,
            });
        }
        self.check_slot(slot)?;

        if precondition.slot_empty {
            if let Some(existing) = self.cached_code(slot) {
                return Ok(StoreOutcome::Conflict(existing.clone()));
            }
        }

        let reward = &mut self.discount_config.reward;
        match slot {
            CodeSlot::Shared { tier: None } => {
                if let Some(target) = reward.shared_code_mut() {
                    *target = Some(code);
                }
            }
            CodeSlot::Shared { tier: Some(index) } => {
                if let Some(tier) = reward.tiers_mut().and_then(|tiers| tiers.get_mut(*index)) {
                    tier.code = Some(code);
                }
            }
            CodeSlot::Identity { .. } => {
                if let Some(key) = slot.cache_key() {
                    self.issued_codes.insert(key, code);
                }
            }
        }
        self.touch();
        Ok(StoreOutcome::Stored(self.clone()))
    }

    fn check_slot(&self, slot: &CodeSlot) -> Result<(), StoreError> {
        let reward = &self.discount_config.reward;
        let valid = match (slot.tier(), reward.tiers()) {
            (None, None) => true,
            (Some(index), Some(tiers)) => index < tiers.len(),
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(StoreError::SlotMismatch {
                campaign_id: self.id.clone(),
                slot: slot.to_string(),
            })
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaigns::{DiscountKind, DiscountReward, DiscountTier};
    use popgate_types::DeliveryMode;

    fn draft(reward: DiscountReward) -> CampaignDraft {
        CampaignDraft {
            name: "Spring popup".to_string(),
            status: CampaignStatus::Active,
            discount_config: DiscountConfig {
                enabled: true,
                kind: DiscountKind::Shared,
                reward,
                delivery_mode: DeliveryMode::ShowCode,
                expiry_days: None,
                minimum_amount_cents: None,
            },
            content: serde_json::json!({"headline": "Hello"}),
        }
    }

    fn tiered() -> DiscountReward {
        DiscountReward::Tiered {
            tiers: vec![DiscountTier::new(0, 10.0), DiscountTier::new(5000, 15.0)],
        }
    }

    #[test]
    fn test_write_code_respects_slot_empty() {
        let mut campaign = Campaign::new("c1", "s1", draft(tiered()));
        let slot = CodeSlot::shared(Some(1));

        let first = campaign
            .write_code(&slot, CachedCode::new("A"), WritePrecondition::slot_empty(0))
            .unwrap();
        assert!(matches!(first, StoreOutcome::Stored(_)));
        assert_eq!(campaign.version, 1);

        let second = campaign
            .write_code(&slot, CachedCode::new("B"), WritePrecondition::slot_empty(0))
            .unwrap();
        assert_eq!(second, StoreOutcome::Conflict(CachedCode::new("A")));
        assert_eq!(campaign.cached_code(&slot), Some(&CachedCode::new("A")));
        assert_eq!(campaign.version, 1);

        campaign
            .write_code(&slot, CachedCode::new("C"), WritePrecondition::unconditional(0))
            .unwrap();
        assert_eq!(campaign.cached_code(&slot), Some(&CachedCode::new("C")));
    }

    #[test]
    fn test_write_code_only_touches_its_tier() {
        let mut campaign = Campaign::new("c1", "s1", draft(tiered()));
        campaign
            .write_code(
                &CodeSlot::shared(Some(0)),
                CachedCode::new("LOW"),
                WritePrecondition::slot_empty(0),
            )
            .unwrap();
        campaign
            .write_code(
                &CodeSlot::shared(Some(1)),
                CachedCode::new("HIGH"),
                WritePrecondition::slot_empty(0),
            )
            .unwrap();
        let tiers = campaign.discount_config.reward.tiers().unwrap();
        assert_eq!(tiers[0].code, Some(CachedCode::new("LOW")));
        assert_eq!(tiers[1].code, Some(CachedCode::new("HIGH")));
    }

    #[test]
    fn test_write_code_rejects_mismatched_slot() {
        let mut campaign = Campaign::new("c1", "s1", draft(tiered()));
        let err = campaign
            .write_code(
                &CodeSlot::shared(None),
                CachedCode::new("X"),
                WritePrecondition::slot_empty(0),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotMismatch { .. }));

        assert!(campaign
            .write_code(
                &CodeSlot::shared(Some(5)),
                CachedCode::new("X"),
                WritePrecondition::slot_empty(0),
            )
            .is_err());
    }

    #[test]
    fn test_identity_codes_go_to_issued_codes() {
        let mut campaign = Campaign::new(
            "c1",
            "s1",
            draft(DiscountReward::Percentage {
                value: 10.0,
                code: None,
            }),
        );
        let slot = CodeSlot::for_email("a@b.co", None);
        campaign
            .write_code(&slot, CachedCode::new("ID1"), WritePrecondition::slot_empty(0))
            .unwrap();
        assert_eq!(campaign.issued_codes.len(), 1);
        assert_eq!(campaign.discount_config.reward.shared_code(), None);
        assert_eq!(campaign.cached_code(&slot), Some(&CachedCode::new("ID1")));
    }

    #[test]
    fn test_apply_draft_keeps_codes_for_same_terms() {
        let mut campaign = Campaign::new("c1", "s1", draft(tiered()));
        campaign
            .write_code(
                &CodeSlot::shared(Some(0)),
                CachedCode::new("LOW"),
                WritePrecondition::slot_empty(0),
            )
            .unwrap();
        campaign
            .write_code(
                &CodeSlot::for_session("s", Some(0)),
                CachedCode::new("MINE"),
                WritePrecondition::slot_empty(0),
            )
            .unwrap();

        let mut renamed = draft(tiered());
        renamed.name = "Renamed".to_string();
        campaign.apply_draft(renamed);
        assert_eq!(
            campaign.cached_code(&CodeSlot::shared(Some(0))),
            Some(&CachedCode::new("LOW"))
        );
        assert_eq!(campaign.issued_codes.len(), 1);
        assert_eq!(campaign.terms_revision, 0);

        campaign.apply_draft(draft(DiscountReward::Tiered {
            tiers: vec![DiscountTier::new(0, 12.0), DiscountTier::new(5000, 15.0)],
        }));
        assert_eq!(campaign.cached_code(&CodeSlot::shared(Some(0))), None);
        assert!(campaign.issued_codes.is_empty());
        assert_eq!(campaign.terms_revision, 1);
    }

    #[test]
    fn test_write_code_under_old_terms_is_stale() {
        let ten = || DiscountReward::Percentage {
            value: 10.0,
            code: None,
        };
        let mut campaign = Campaign::new("c1", "s1", draft(ten()));
        let read_revision = campaign.terms_revision;
        campaign.apply_draft(draft(DiscountReward::Percentage {
            value: 50.0,
            code: None,
        }));
        let version = campaign.version;

        let slot = CodeSlot::shared(None);
        let outcome = campaign
            .write_code(
                &slot,
                CachedCode::new("PCT10"),
                WritePrecondition::unconditional(read_revision),
            )
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Stale { terms_revision: 1 });
        assert_eq!(campaign.cached_code(&slot), None);
        assert_eq!(campaign.version, version);

        let outcome = campaign
            .write_code(
                &slot,
                CachedCode::new("PCT50"),
                WritePrecondition::slot_empty(campaign.terms_revision),
            )
            .unwrap();
        assert!(matches!(outcome, StoreOutcome::Stored(_)));
    }

    #[test]
    fn test_deserialize_seed_yaml() {
        let yaml = r#"
id: spring
storeId: demo-store
name: Spring
status: ACTIVE
discountConfig:
  enabled: true
  reward:
    valueType: FREE_SHIPPING
"#;
        let campaign: Campaign = serde_norway::from_str(yaml).unwrap();
        assert!(campaign.is_active());
        assert_eq!(campaign.version, 0);
        assert_eq!(campaign.terms_revision, 0);
        assert!(campaign.issued_codes.is_empty());
        assert_eq!(campaign.content, serde_json::Value::Null);
    }
}
