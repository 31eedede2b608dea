use axum::{debug_handler, response::IntoResponse, Json};
use popgate_types::ServerInfo;

#[utoipa::path(
    get,
    path = "/api/v1/info",
    responses(
        (status = 200, description = "Name and version of the running server", body = ServerInfo)
    )
)]
#[debug_handler]
pub async fn info_handler() -> impl IntoResponse {
    Json(ServerInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
