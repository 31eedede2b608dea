use std::sync::Arc;

use popgate_types::{DeliveryMode, IssueDiscountResponse};
use tracing::{debug, error, info, instrument, warn};

use super::{
    commerce::{CreateCodeParams, DiscountClient, EmailLock},
    error::IssuanceError,
    guards::{ChallengeValidator, RateLimiter},
    message::issuance_message,
};
use crate::{
    campaigns::{
        select_tier, CachedCode, Campaign, CampaignStore, CodeSlot, DiscountKind, RewardValue,
        StoreOutcome, WritePrecondition,
    },
    session::StoreSession,
    settings::discounts::{CacheWriteMode, DiscountSettings},
    utils::sensitive_data::mask_email,
};

pub use popgate_types::IssueDiscountRequest as IssuanceRequest;

const MAX_ID_LEN: usize = 256;
const MAX_EMAIL_LEN: usize = 254;

/// How the returned code was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOutcome {
    /// Served from the campaign cache
    Cached,
    /// Created on the commerce platform by this request
    Created,
    /// Created by this request, but another request cached its code first
    RaceLost,
}

impl CodeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeOutcome::Cached => "cached",
            CodeOutcome::Created => "created",
            CodeOutcome::RaceLost => "race_lost",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceResult {
    pub discount_code: String,
    pub discount_id: Option<String>,
    pub is_new_discount: bool,
    pub tier_used: Option<u32>,
    pub message: String,
    pub delivery_mode: DeliveryMode,
    pub auto_apply_path: Option<String>,
    pub outcome: CodeOutcome,
}

impl From<IssuanceResult> for IssueDiscountResponse {
    fn from(result: IssuanceResult) -> Self {
        IssueDiscountResponse {
            success: true,
            discount_code: result.discount_code,
            discount_id: result.discount_id,
            is_new_discount: result.is_new_discount,
            tier_used: result.tier_used,
            message: result.message,
            delivery_mode: result.delivery_mode,
            auto_apply_path: result.auto_apply_path,
        }
    }
}

/// Hands out discount codes for campaigns, creating them on the commerce
/// platform the first time a code slot is needed.
///
/// Checks run in a fixed order and the first failing one decides the error:
/// session, request shape, challenge token, rate limit, campaign state,
/// email requirement. Only a successful creation writes to the store.
#[derive(Clone)]
pub struct DiscountIssuanceService {
    store: Arc<dyn CampaignStore>,
    commerce: Arc<dyn DiscountClient>,
    rate_limiter: Arc<dyn RateLimiter>,
    challenges: Arc<dyn ChallengeValidator>,
    settings: DiscountSettings,
}

impl DiscountIssuanceService {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        commerce: Arc<dyn DiscountClient>,
        rate_limiter: Arc<dyn RateLimiter>,
        challenges: Arc<dyn ChallengeValidator>,
        settings: DiscountSettings,
    ) -> Self {
        Self {
            store,
            commerce,
            rate_limiter,
            challenges,
            settings,
        }
    }

    #[instrument(
        name = "issue_discount",
        skip_all,
        fields(campaign_id = %request.campaign_id, store_id = tracing::field::Empty)
    )]
    pub async fn issue(
        &self,
        session: Option<&StoreSession>,
        request: &IssuanceRequest,
    ) -> Result<IssuanceResult, IssuanceError> {
        let session = session.ok_or(IssuanceError::InvalidSession)?;
        tracing::Span::current().record("store_id", session.store_id.as_str());

        let email = validate_request(request)?;

        if !self
            .challenges
            .validate(&request.challenge_token, &request.session_id)
            .await
        {
            return Err(IssuanceError::InvalidChallengeToken);
        }

        let decision = self
            .rate_limiter
            .check_rate_limit(&rate_limit_key(&request.campaign_id, email, &request.session_id))
            .await;
        if !decision.allowed {
            return Err(IssuanceError::RateLimited {
                reset_at: decision.reset_at,
                remaining: decision.remaining,
            });
        }

        let campaign = self.load_campaign(session, &request.campaign_id).await?;
        let config = &campaign.discount_config;

        if config.delivery_mode.is_email_locked() && email.is_none() {
            return Err(IssuanceError::InvalidRequest(
                "email is required for this campaign".to_string(),
            ));
        }

        let (tier, reward) = resolve_tier(&campaign, request.cart_subtotal_cents)?;
        let slot = resolve_slot(&campaign, tier, email, &request.session_id);
        let (code, outcome) = self
            .get_or_create(session, &campaign, &slot, reward, email)
            .await?;

        let delivery_mode = config.delivery_mode;
        let message = issuance_message(
            &code.code,
            reward,
            delivery_mode,
            &self.settings.currency_symbol,
        );
        let auto_apply_path = delivery_mode
            .uses_auto_apply()
            .then(|| cart_apply_path(&code.code));

        info!(
            code = %code.code,
            tier = ?tier,
            shopper = ?email.map(mask_email),
            outcome = outcome.as_str(),
            "Discount issued"
        );

        Ok(IssuanceResult {
            discount_code: code.code,
            discount_id: code.discount_id,
            is_new_discount: outcome == CodeOutcome::Created,
            tier_used: tier.map(|t| t as u32),
            message,
            delivery_mode,
            auto_apply_path,
            outcome,
        })
    }

    async fn load_campaign(
        &self,
        session: &StoreSession,
        campaign_id: &str,
    ) -> Result<Campaign, IssuanceError> {
        let campaign = self
            .store
            .find_by_id(campaign_id)
            .await?
            .filter(|c| c.store_id == session.store_id)
            .ok_or_else(|| IssuanceError::CampaignNotFound(campaign_id.to_string()))?;

        if !campaign.is_active() {
            return Err(IssuanceError::CampaignInactive(campaign_id.to_string()));
        }
        if !campaign.discount_config.enabled {
            return Err(IssuanceError::DiscountDisabled(campaign_id.to_string()));
        }
        Ok(campaign)
    }

    async fn get_or_create(
        &self,
        session: &StoreSession,
        campaign: &Campaign,
        slot: &CodeSlot,
        reward: RewardValue,
        email: Option<&str>,
    ) -> Result<(CachedCode, CodeOutcome), IssuanceError> {
        if let Some(code) = campaign.cached_code(slot) {
            debug!(%slot, "Serving cached code");
            return Ok((code.clone(), CodeOutcome::Cached));
        }

        let config = &campaign.discount_config;
        let params = CreateCodeParams {
            campaign_id: campaign.id.clone(),
            title: code_title(campaign, slot),
            reward,
            tier: slot.tier(),
            expiry_days: config.expiry_days,
            minimum_amount_cents: config.minimum_amount_cents,
            usage_limit: (config.kind == DiscountKind::SingleUse).then_some(1),
            email_lock: config
                .delivery_mode
                .is_email_locked()
                .then(|| email.map(EmailLock::for_email))
                .flatten(),
        };

        let created = self
            .commerce
            .create_code(session, &params)
            .await
            .map_err(|err| {
                warn!(%slot, error = %err, "Commerce platform failed to create code");
                IssuanceError::DiscountIssuanceFailed(err.to_string())
            })?;
        let code = CachedCode::with_discount_id(&created.code, &created.discount_id);

        let revision = campaign.terms_revision;
        let precondition = match self.settings.cache_write {
            CacheWriteMode::CompareAndSwap => WritePrecondition::slot_empty(revision),
            CacheWriteMode::LastWriteWins => WritePrecondition::unconditional(revision),
        };

        match self
            .store
            .store_code(&campaign.id, slot, code.clone(), precondition)
            .await
        {
            Ok(StoreOutcome::Stored(stored)) => {
                debug!(%slot, version = stored.version, "Cached new code");
                Ok((code, CodeOutcome::Created))
            }
            Ok(StoreOutcome::Conflict(winner)) => {
                warn!(
                    %slot,
                    orphaned_code = %code.code,
                    orphaned_discount_id = %created.discount_id,
                    winner = %winner.code,
                    "Another request cached a code first, returning it"
                );
                Ok((winner, CodeOutcome::RaceLost))
            }
            Ok(StoreOutcome::Stale { terms_revision }) => {
                warn!(
                    %slot,
                    orphaned_code = %code.code,
                    orphaned_discount_id = %created.discount_id,
                    read_revision = campaign.terms_revision,
                    terms_revision,
                    "Discount terms changed while the code was created, not caching it"
                );
                Err(IssuanceError::DiscountIssuanceFailed(
                    "campaign discount terms changed during issuance".to_string(),
                ))
            }
            Err(err) => {
                error!(
                    %slot,
                    orphaned_code = %code.code,
                    orphaned_discount_id = %created.discount_id,
                    error = %err,
                    "Created code could not be cached"
                );
                Err(err.into())
            }
        }
    }
}

/// Check the request body, returning the normalized email if one was given.
fn validate_request(request: &IssuanceRequest) -> Result<Option<&str>, IssuanceError> {
    for (name, value) in [
        ("campaignId", &request.campaign_id),
        ("sessionId", &request.session_id),
    ] {
        if value.trim().is_empty() {
            return Err(IssuanceError::InvalidRequest(format!("{name} is required")));
        }
        if value.len() > MAX_ID_LEN {
            return Err(IssuanceError::InvalidRequest(format!("{name} is too long")));
        }
    }

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !looks_like_email(email) {
            return Err(IssuanceError::InvalidRequest(
                "email is not a valid address".to_string(),
            ));
        }
    }

    if let Some(items) = &request.line_items {
        if items
            .iter()
            .any(|item| item.quantity == 0 || item.variant_id.trim().is_empty())
        {
            return Err(IssuanceError::InvalidRequest(
                "lineItems need a variantId and a positive quantity".to_string(),
            ));
        }
    }

    Ok(email)
}

fn looks_like_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Attempts are counted per campaign and shopper; the email identifies the
/// shopper when there is one.
fn rate_limit_key(campaign_id: &str, email: Option<&str>, session_id: &str) -> String {
    match email {
        Some(email) => format!("{campaign_id}:email:{}", email.to_lowercase()),
        None => format!("{campaign_id}:session:{session_id}"),
    }
}

fn resolve_tier(
    campaign: &Campaign,
    cart_subtotal_cents: Option<u64>,
) -> Result<(Option<usize>, RewardValue), IssuanceError> {
    let reward = &campaign.discount_config.reward;
    match reward.tiers() {
        Some(tiers) => {
            let selection = select_tier(tiers, cart_subtotal_cents).ok_or_else(|| {
                IssuanceError::DiscountIssuanceFailed(format!(
                    "campaign {} has no discount tiers",
                    campaign.id
                ))
            })?;
            Ok((
                Some(selection.index),
                RewardValue::Percentage(selection.tier.value),
            ))
        }
        None => reward.flat_value().map(|value| (None, value)).ok_or_else(|| {
            IssuanceError::DiscountIssuanceFailed(format!(
                "campaign {} has no discount value",
                campaign.id
            ))
        }),
    }
}

/// Shared codes are cached per tier; email-locked and single-use codes per
/// shopper identity.
fn resolve_slot(
    campaign: &Campaign,
    tier: Option<usize>,
    email: Option<&str>,
    session_id: &str,
) -> CodeSlot {
    let config = &campaign.discount_config;
    let identity_bound =
        config.delivery_mode.is_email_locked() || config.kind == DiscountKind::SingleUse;

    match (identity_bound, email) {
        (false, _) => CodeSlot::shared(tier),
        (true, Some(email)) => CodeSlot::for_email(email, tier),
        (true, None) => CodeSlot::for_session(session_id, tier),
    }
}

fn code_title(campaign: &Campaign, slot: &CodeSlot) -> String {
    let config = &campaign.discount_config;
    let mut title = campaign.name.clone();
    if let Some(tier) = slot.tier() {
        title.push_str(&format!(" (tier {})", tier + 1));
    }
    if config.delivery_mode.is_email_locked() {
        title.push_str(" [email locked]");
    } else if config.kind == DiscountKind::SingleUse {
        title.push_str(" [single use]");
    }
    title
}

fn cart_apply_path(code: &str) -> String {
    let mut encoded = String::with_capacity(code.len());
    for byte in code.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("/discount/{encoded}?redirect=/cart")
}
