use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Extension, Json,
};
use popgate_core::session::StoreSession;
use popgate_types::{ChallengeRequest, ChallengeResponse, ErrorResponse};
use tracing::debug;

use crate::{api::error::AppError, app_state::SharedAppState, challenge::ChallengeError};

#[utoipa::path(
    post,
    path = "/api/v1/storefront/challenge",
    request_body = ChallengeRequest,
    responses(
    (status = 200, body = ChallengeResponse),
    (status = 400, description = "Session id is missing or too long", body = ErrorResponse),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn challenge_handler(
    State(state): State<SharedAppState>,
    Extension(session): Extension<StoreSession>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let issued = state
        .challenges
        .issue(&payload.session_id)
        .map_err(|e| match e {
            ChallengeError::InvalidSessionId => AppError::InvalidInput(e.to_string()),
            other => AppError::InternalServerError(other.to_string()),
        })?;
    debug!(store_id = %session.store_id, expires_at = %issued.expires_at, "Challenge issued");

    Ok(Json(ChallengeResponse {
        challenge_token: issued.token,
        expires_at: issued.expires_at.timestamp(),
    }))
}
