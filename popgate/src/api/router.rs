use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use popgate_types::{
    ChallengeRequest, ChallengeResponse, DeliveryMode, ErrorResponse, IssueDiscountRequest,
    IssueDiscountResponse, LineItem, ServerInfo,
};
use tracing::info;
use utoipa::openapi::security::SecurityScheme;
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::api::handlers::campaigns::__path_get_campaign_handler;
use crate::api::handlers::campaigns::__path_list_campaigns_handler;
use crate::api::handlers::campaigns::__path_set_campaign_status_handler;
use crate::api::handlers::campaigns::__path_upsert_campaign_handler;
use crate::api::handlers::challenge::__path_challenge_handler;
use crate::api::handlers::discounts::__path_issue_discount_handler;
use crate::api::handlers::health::__path_health_checker_handler;
use crate::api::handlers::info::__path_info_handler;
use crate::app_state::SharedAppState;

use super::auth::{require_store_session, resolve_store_session};
use super::handlers::campaigns::{
    get_campaign_handler, list_campaigns_handler, set_campaign_status_handler,
    upsert_campaign_handler, CampaignStatusRequest,
};
use super::handlers::challenge::challenge_handler;
use super::handlers::discounts::issue_discount_handler;
use super::handlers::health::health_checker_handler;
use super::handlers::info::info_handler;
use super::rate_limiting::middleware::RateLimitMetricsLayer;
use super::rate_limiting::{create_campaigns_limiter, create_storefront_limiter};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_checker_handler,
        info_handler,
        challenge_handler,
        issue_discount_handler,
        list_campaigns_handler,
        get_campaign_handler,
        upsert_campaign_handler,
        set_campaign_status_handler,
    ),
    components(
        schemas(
            IssueDiscountRequest, IssueDiscountResponse, LineItem, DeliveryMode,
            ErrorResponse, ChallengeRequest, ChallengeResponse, ServerInfo,
            CampaignStatusRequest
        )
    ),
    tags(
        (name = "popgate", description = "storefront popup discount api")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        )
    }
}

pub struct ApiRoutes;

impl ApiRoutes {
    pub fn create(state: SharedAppState) -> anyhow::Result<Router> {
        let api = ApiDoc::openapi();
        let rate_limiting = &state.settings.api.rate_limiting;

        let mut storefront_router = Router::new()
            .route(
                "/api/v1/storefront/challenge",
                post(challenge_handler).layer(middleware::from_fn(require_store_session)),
            )
            .route(
                "/api/v1/storefront/discounts/issue",
                post(issue_discount_handler),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                resolve_store_session,
            ));

        let mut campaigns_router = Router::new()
            .route("/api/v1/campaigns", get(list_campaigns_handler))
            .route(
                "/api/v1/campaigns/{campaign_id}",
                get(get_campaign_handler).put(upsert_campaign_handler),
            )
            .route(
                "/api/v1/campaigns/{campaign_id}/status",
                post(set_campaign_status_handler),
            )
            .route_layer(middleware::from_fn(require_store_session))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                resolve_store_session,
            ));

        if rate_limiting.enabled {
            if rate_limiting.storefront.is_enabled() {
                info!(
                    requests_per_minute = rate_limiting.storefront.requests_per_minute,
                    burst_size = rate_limiting.storefront.burst_size,
                    "Rate limiting storefront routes per client IP"
                );
                storefront_router = storefront_router
                    .route_layer(create_storefront_limiter(&rate_limiting.storefront)?)
                    .route_layer(RateLimitMetricsLayer::new("storefront"));
            }
            if rate_limiting.campaigns.is_enabled() {
                info!(
                    requests_per_minute = rate_limiting.campaigns.requests_per_minute,
                    burst_size = rate_limiting.campaigns.burst_size,
                    "Rate limiting campaign routes per token"
                );
                campaigns_router = campaigns_router
                    .route_layer(create_campaigns_limiter(&rate_limiting.campaigns)?)
                    .route_layer(RateLimitMetricsLayer::new("campaigns"));
            }
        }

        let public_router = Router::new()
            .route("/api/v1/health", get(health_checker_handler))
            .route("/api/v1/info", get(info_handler))
            .route(
                "/api-docs/openapi.json",
                get({
                    let api = api.clone();
                    move || async move { axum::Json(api) }
                }),
            )
            .merge(Redoc::with_url("/redoc", api));

        Ok(Router::new()
            .merge(storefront_router)
            .merge(campaigns_router)
            .merge(public_router)
            .layer(DefaultBodyLimit::max(state.settings.api.max_body_size))
            .with_state(state))
    }
}
