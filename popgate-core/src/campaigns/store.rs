use async_trait::async_trait;
use thiserror::Error;

use super::{
    campaign::Campaign,
    code_slot::CodeSlot,
    discount_config::{CachedCode, ConfigValidationError},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Campaign {0} not found")]
    NotFound(String),

    #[error("Slot {slot} does not exist on campaign {campaign_id}")]
    SlotMismatch { campaign_id: String, slot: String },

    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),

    #[error("Campaign store unavailable: {0}")]
    Unavailable(String),
}

/// Condition under which [`CampaignStore::store_code`] may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePrecondition {
    /// [`Campaign::terms_revision`] the code was created under
    pub terms_revision: u64,
    /// Only write when the slot holds no code yet
    pub slot_empty: bool,
}

impl WritePrecondition {
    pub fn slot_empty(terms_revision: u64) -> Self {
        Self {
            terms_revision,
            slot_empty: true,
        }
    }

    /// Overwrite whatever is cached
    pub fn unconditional(terms_revision: u64) -> Self {
        Self {
            terms_revision,
            slot_empty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// The code was written, carries the campaign as persisted
    Stored(Campaign),
    /// The slot was taken; carries the code that is already cached
    Conflict(CachedCode),
    /// The discount terms changed since the code was created; nothing written
    Stale {
        /// Revision of the terms now in force
        terms_revision: u64,
    },
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>, StoreError>;

    /// Persist a code into a cache slot of a campaign.
    ///
    /// The write touches only the addressed slot, so concurrent writes to
    /// other slots are never lost.
    async fn store_code(
        &self,
        id: &str,
        slot: &CodeSlot,
        code: CachedCode,
        precondition: WritePrecondition,
    ) -> Result<StoreOutcome, StoreError>;
}
