//! Loads campaigns from YAML files at startup.

use std::path::{Path, PathBuf};

use anyhow::Context;
use popgate_core::campaigns::{Campaign, SharedCampaignStore};
use tracing::{info, warn};

use crate::settings::config::Settings;

/// Every `*.yaml` / `*.yml` file in `folder`, sorted by file name.
fn seed_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn load_campaign_file(path: &Path) -> anyhow::Result<Campaign> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read campaign file {}", path.display()))?;
    let campaign: Campaign = serde_norway::from_str(&content)
        .with_context(|| format!("Failed to parse campaign file {}", path.display()))?;
    Ok(campaign)
}

/// Seed `store` from `settings.campaigns.folder`.
///
/// A missing folder means no campaigns; a broken file aborts startup.
/// Returns the number of campaigns loaded.
pub async fn seed_campaigns(settings: &Settings, store: &SharedCampaignStore) -> anyhow::Result<usize> {
    let folder = Path::new(&settings.campaigns.folder);
    if !folder.is_dir() {
        warn!("Campaign folder {} does not exist, starting without campaigns", folder.display());
        return Ok(0);
    }

    let mut count = 0;
    for path in seed_files(folder)? {
        let campaign = load_campaign_file(&path)?;
        if !settings.api.stores.contains_key(&campaign.store_id) {
            warn!(
                campaign_id = %campaign.id,
                store_id = %campaign.store_id,
                "Campaign belongs to a store that is not configured"
            );
        }
        let id = campaign.id.clone();
        store
            .add_campaign(campaign)
            .await
            .with_context(|| format!("Invalid campaign {} in {}", id, path.display()))?;
        count += 1;
    }

    info!("Loaded {} campaigns from {}", count, folder.display());
    Ok(count)
}
