use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{
    campaign::{Campaign, CampaignDraft, CampaignStatus},
    code_slot::CodeSlot,
    discount_config::CachedCode,
    store::{CampaignStore, StoreError, StoreOutcome, WritePrecondition},
};

pub type CampaignHashMap = HashMap<String, Campaign>;

/// In-process campaign store shared between request handlers.
///
/// Every code write happens under the write lock, which makes
/// `WritePrecondition::slot_empty` an atomic compare-and-set.
#[derive(Debug, Clone)]
pub struct SharedCampaignStore {
    campaigns: Arc<RwLock<CampaignHashMap>>,
}

impl Default for SharedCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedCampaignStore {
    pub fn new() -> SharedCampaignStore {
        SharedCampaignStore {
            campaigns: Arc::new(RwLock::new(CampaignHashMap::new())),
        }
    }

    pub async fn add_campaign(&self, campaign: Campaign) -> Result<(), StoreError> {
        campaign.discount_config.validate()?;
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), campaign);
        Ok(())
    }

    pub async fn get_campaign(&self, id: &str) -> Option<Campaign> {
        self.campaigns.read().await.get(id).cloned()
    }

    /// Campaigns of one store, ordered by id.
    pub async fn list_for_store(&self, store_id: &str) -> Vec<Campaign> {
        let campaigns = self.campaigns.read().await;
        let mut list: Vec<Campaign> = campaigns
            .values()
            .filter(|c| c.store_id == store_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Create or edit a campaign of `store_id`.
    ///
    /// An id owned by another store is reported as not found.
    #[instrument(skip(self, draft))]
    pub async fn upsert(
        &self,
        store_id: &str,
        id: &str,
        draft: CampaignDraft,
    ) -> Result<Campaign, StoreError> {
        draft.discount_config.validate()?;

        let mut campaigns = self.campaigns.write().await;
        match campaigns.get_mut(id) {
            Some(existing) if existing.store_id != store_id => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Some(existing) => {
                existing.apply_draft(draft);
                debug!(version = existing.version, "Campaign updated");
                Ok(existing.clone())
            }
            None => {
                let campaign = Campaign::new(id, store_id, draft);
                campaigns.insert(id.to_string(), campaign.clone());
                debug!("Campaign created");
                Ok(campaign)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        store_id: &str,
        id: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, StoreError> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(id)
            .filter(|c| c.store_id == store_id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if campaign.status != status {
            campaign.status = status;
            campaign.version += 1;
            campaign.updated_at = chrono::Utc::now();
        }
        Ok(campaign.clone())
    }

    pub async fn len(&self) -> usize {
        self.campaigns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.campaigns.read().await.is_empty()
    }
}

#[async_trait]
impl CampaignStore for SharedCampaignStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        Ok(self.get_campaign(id).await)
    }

    #[instrument(skip(self, code), fields(code = %code.code))]
    async fn store_code(
        &self,
        id: &str,
        slot: &CodeSlot,
        code: CachedCode,
        precondition: WritePrecondition,
    ) -> Result<StoreOutcome, StoreError> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        campaign.write_code(slot, code, precondition)
    }
}
