use std::sync::Arc;

use popgate_core::{
    campaigns::SharedCampaignStore,
    discounts::{DiscountClient, DiscountIssuanceService},
};
use tracing::info;

use crate::challenge::ChallengeTokenService;
use crate::commerce::ShopifyDiscountClient;
use crate::limiter::IssuanceLimiter;
use crate::seed::seed_campaigns;
use crate::settings::config::Settings;
use crate::stop_flag;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub stop_flag: stop_flag::StopFlag,
    pub campaigns: SharedCampaignStore,
    pub issuance: DiscountIssuanceService,
    pub challenges: Arc<ChallengeTokenService>,
    pub limiter: Arc<IssuanceLimiter>,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    /// Wire the production collaborators and seed campaigns.
    pub async fn new(settings: Settings) -> anyhow::Result<SharedAppState> {
        let stop_flag = stop_flag::StopFlag::new();
        stop_flag::register_signal_handler(&stop_flag);

        let commerce = Arc::new(ShopifyDiscountClient::new(&settings.commerce)?);
        let state = Self::with_discount_client(settings, stop_flag, commerce);

        seed_campaigns(&state.settings, &state.campaigns).await?;
        info!(
            stores = state.settings.api.stores.len(),
            campaigns = state.campaigns.len().await,
            "Application state ready"
        );
        Ok(state)
    }

    /// State with an explicit commerce client and an empty campaign store.
    pub fn with_discount_client(
        settings: Settings,
        stop_flag: stop_flag::StopFlag,
        commerce: Arc<dyn DiscountClient>,
    ) -> SharedAppState {
        let campaigns = SharedCampaignStore::new();
        let limiter = Arc::new(IssuanceLimiter::new(&settings.api.rate_limiting));
        let challenges = Arc::new(ChallengeTokenService::new(&settings.challenge));

        let issuance = DiscountIssuanceService::new(
            Arc::new(campaigns.clone()),
            commerce,
            limiter.clone(),
            challenges.clone(),
            settings.discounts.clone(),
        );

        Arc::new(AppState {
            settings,
            stop_flag,
            campaigns,
            issuance,
            challenges,
            limiter,
        })
    }
}
