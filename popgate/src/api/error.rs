use axum::http::{header::RETRY_AFTER, HeaderValue, StatusCode};
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use popgate_core::{campaigns::StoreError, discounts::IssuanceError};
use popgate_types::ErrorResponse;
use thiserror::Error;
use tracing::error;

#[derive(Clone, Error, Debug, PartialEq)]
pub enum AppError {
    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    #[error("Missing or unknown store token")]
    Unauthorized,

    #[error("Campaign {0} not found")]
    CampaignNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Status, stable error kind and message of the response
    fn get_error_msg(&self) -> (StatusCode, &'static str, String) {
        let status = match self {
            AppError::Issuance(err) => issuance_status(err),
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.kind(), self.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Issuance(err) => err.kind(),
            AppError::Unauthorized => "unauthorized",
            AppError::CampaignNotFound(_) => "campaign_not_found",
            AppError::InvalidInput(_) => "invalid_request",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::InternalServerError(_) => "internal_error",
        }
    }
}

pub fn issuance_status(err: &IssuanceError) -> StatusCode {
    match err {
        IssuanceError::InvalidSession => StatusCode::UNAUTHORIZED,
        IssuanceError::InvalidChallengeToken => StatusCode::FORBIDDEN,
        IssuanceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        IssuanceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        IssuanceError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
        IssuanceError::CampaignInactive(_) => StatusCode::BAD_REQUEST,
        IssuanceError::DiscountDisabled(_) => StatusCode::BAD_REQUEST,
        IssuanceError::DiscountIssuanceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::CampaignNotFound(id),
            StoreError::Invalid(e) => AppError::InvalidInput(e.to_string()),
            StoreError::SlotMismatch { .. } => AppError::InvalidInput(err.to_string()),
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        if let Some(app_error) = e.downcast_ref::<AppError>() {
            return app_error.clone();
        }
        AppError::InternalServerError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.get_error_msg();
        if status.is_server_error() {
            error!(kind, "{}", message);
        }

        let mut response = (status, Json(ErrorResponse::new(kind, message))).into_response();

        if let AppError::Issuance(IssuanceError::RateLimited { reset_at, .. }) = &self {
            let seconds = (*reset_at - Utc::now()).num_seconds().max(1);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
