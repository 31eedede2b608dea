use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Extension, Json,
};
use popgate_core::{discounts::IssuanceError, session::StoreSession};
use popgate_types::{ErrorResponse, IssueDiscountRequest, IssueDiscountResponse};

use crate::{api::error::AppError, app_state::SharedAppState, metrics};

#[utoipa::path(
    post,
    path = "/api/v1/storefront/discounts/issue",
    request_body = IssueDiscountRequest,
    responses(
    (status = 200, body = IssueDiscountResponse),
    (status = 400, description = "Invalid request, inactive campaign or disabled discount", body = ErrorResponse),
    (status = 401, description = "Store token is missing or unknown", body = ErrorResponse),
    (status = 403, description = "Challenge token is missing, invalid or expired", body = ErrorResponse),
    (status = 404, description = "Campaign not found", body = ErrorResponse),
    (status = 429, description = "Too many attempts, see Retry-After", body = ErrorResponse),
    (status = 500, description = "The commerce backend did not create the code", body = ErrorResponse),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
#[debug_handler]
pub async fn issue_discount_handler(
    State(state): State<SharedAppState>,
    session: Option<Extension<StoreSession>>,
    payload: Result<Json<IssueDiscountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let session = session.map(|Extension(session)| session);

    let result = match payload {
        Ok(Json(request)) => state
            .issuance
            .issue(session.as_ref(), &request)
            .await
            .map(|result| (request.campaign_id, result)),
        // A missing session still wins over a broken body.
        Err(_) if session.is_none() => Err(IssuanceError::InvalidSession),
        Err(rejection) => Err(IssuanceError::InvalidRequest(rejection.body_text())),
    };

    match result {
        Ok((campaign_id, result)) => {
            metrics::record_discount_issued(&campaign_id, result.outcome.as_str());
            Ok(Json(IssueDiscountResponse::from(result)))
        }
        Err(err) => {
            metrics::record_issuance_failure(err.kind());
            Err(err.into())
        }
    }
}
