use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Extension, Json,
};
use popgate_core::{
    campaigns::{CampaignDraft, CampaignStatus},
    session::StoreSession,
};
use popgate_types::ErrorResponse;
use serde::Deserialize;
use tracing::info;

use crate::{api::error::AppError, app_state::SharedAppState};

const MAX_CAMPAIGN_ID_LEN: usize = 128;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CampaignStatusRequest {
    /// `DRAFT`, `ACTIVE` or `PAUSED`
    #[schema(value_type = String)]
    pub status: CampaignStatus,
}

fn check_campaign_id(id: &str) -> Result<(), AppError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_CAMPAIGN_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Campaign id must be 1 to {MAX_CAMPAIGN_ID_LEN} characters of [A-Za-z0-9_-]"
        )))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    responses(
    (status = 200, description = "Campaigns of the authenticated store, issued codes included"),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn list_campaigns_handler(
    State(state): State<SharedAppState>,
    Extension(session): Extension<StoreSession>,
) -> impl IntoResponse {
    Json(state.campaigns.list_for_store(&session.store_id).await)
}

#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{campaign_id}",
    params(("campaign_id" = String, Path, description = "Campaign id")),
    responses(
    (status = 200, description = "The campaign"),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    (status = 404, description = "No such campaign for this store", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn get_campaign_handler(
    State(state): State<SharedAppState>,
    Extension(session): Extension<StoreSession>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = state
        .campaigns
        .get_campaign(&campaign_id)
        .await
        .filter(|c| c.store_id == session.store_id)
        .ok_or(AppError::CampaignNotFound(campaign_id))?;
    Ok(Json(campaign))
}

/// Create or edit a campaign. Codes issued so far are kept.
#[utoipa::path(
    put,
    path = "/api/v1/campaigns/{campaign_id}",
    params(("campaign_id" = String, Path, description = "Campaign id")),
    request_body(content = Object, description = "name, status, discountConfig and content of the campaign"),
    responses(
    (status = 200, description = "The stored campaign"),
    (status = 400, description = "Invalid discount configuration", body = ErrorResponse),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    (status = 404, description = "The id belongs to another store", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn upsert_campaign_handler(
    State(state): State<SharedAppState>,
    Extension(session): Extension<StoreSession>,
    Path(campaign_id): Path<String>,
    payload: Result<Json<CampaignDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    check_campaign_id(&campaign_id)?;
    let Json(draft) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let campaign = state
        .campaigns
        .upsert(&session.store_id, &campaign_id, draft)
        .await?;
    info!(
        store_id = %session.store_id,
        campaign_id = %campaign.id,
        version = campaign.version,
        "Campaign saved"
    );
    Ok(Json(campaign))
}

#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{campaign_id}/status",
    params(("campaign_id" = String, Path, description = "Campaign id")),
    request_body = CampaignStatusRequest,
    responses(
    (status = 200, description = "The campaign with its new status"),
    (status = 400, description = "Unknown status", body = ErrorResponse),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    (status = 404, description = "No such campaign for this store", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn set_campaign_status_handler(
    State(state): State<SharedAppState>,
    Extension(session): Extension<StoreSession>,
    Path(campaign_id): Path<String>,
    payload: Result<Json<CampaignStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let campaign = state
        .campaigns
        .set_status(&session.store_id, &campaign_id, payload.status)
        .await?;
    info!(
        store_id = %session.store_id,
        campaign_id = %campaign.id,
        status = %campaign.status,
        "Campaign status changed"
    );
    Ok(Json(campaign))
}
