pub mod campaign;
pub mod code_slot;
pub mod discount_config;
pub mod shared_campaign_store;
pub mod store;
pub mod tier;

pub use campaign::{Campaign, CampaignDraft, CampaignStatus};
pub use code_slot::CodeSlot;
pub use discount_config::{
    CachedCode, ConfigValidationError, DiscountConfig, DiscountKind, DiscountReward, RewardValue,
};
pub use shared_campaign_store::SharedCampaignStore;
pub use store::{CampaignStore, StoreError, StoreOutcome, WritePrecondition};
pub use tier::{select_tier, DiscountTier, TierSelection};
