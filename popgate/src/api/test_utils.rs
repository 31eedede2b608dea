//! Shared helpers for API tests

use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;
use config::{builder::DefaultState, Config, ConfigBuilder};
use popgate_core::testing::RecordingDiscountClient;

use crate::api::router::ApiRoutes;
use crate::app_state::{AppState, SharedAppState};
use crate::seed::seed_campaigns;
use crate::settings::config::Settings;
use crate::stop_flag::StopFlag;

pub const DEMO_TOKEN: &str = "test-storefront-token-demo";
pub const OUTLET_TOKEN: &str = "test-storefront-token-outlet";

pub fn test_config_builder() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(config::File::with_name("tests/test_config"))
}

/// App state for `config`, seeded from its campaign folder, with a
/// recording commerce client.
pub async fn create_test_app_state_with_config(
    config: Config,
) -> (SharedAppState, Arc<RecordingDiscountClient>) {
    let settings = Settings::from_config(config).unwrap();
    let commerce = Arc::new(RecordingDiscountClient::new());
    let state = AppState::with_discount_client(settings, StopFlag::new(), commerce.clone());
    seed_campaigns(&state.settings, &state.campaigns)
        .await
        .unwrap();
    (state, commerce)
}

pub async fn create_test_app_state() -> (SharedAppState, Arc<RecordingDiscountClient>) {
    create_test_app_state_with_config(test_config_builder().build().unwrap()).await
}

pub fn create_test_server(state: SharedAppState) -> TestServer {
    TestServer::new(ApiRoutes::create(state).unwrap()).unwrap()
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}
