use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use popgate_core::session::StoreSession;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::api::error::AppError;
use crate::app_state::SharedAppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Find the store whose storefront token equals `token`.
///
/// Every configured token is compared in constant time.
pub fn find_store_session(state: &SharedAppState, token: &str) -> Option<StoreSession> {
    let mut found = None;
    for (store_id, store) in &state.settings.api.stores {
        let matches: bool = token
            .as_bytes()
            .ct_eq(store.storefront_token.expose_secret().as_bytes())
            .into();
        if matches {
            found = Some(store_id.as_str());
        }
    }
    found.and_then(|store_id| state.settings.api.session_for(store_id))
}

/// Attach a [`StoreSession`] to requests that carry a known store token.
///
/// Requests without one pass through untouched; routes decide themselves
/// whether a session is required.
pub async fn resolve_store_session(
    State(state): State<SharedAppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match find_store_session(&state, token) {
            Some(session) => {
                debug!(store_id = %session.store_id, "Store session resolved");
                req.extensions_mut().insert(session);
            }
            None => warn!(
                "Unknown store token (token starts with: {}...) | {} {}",
                token.chars().take(4).collect::<String>(),
                req.method(),
                req.uri().path()
            ),
        }
    }
    next.run(req).await
}

pub async fn require_store_session(req: Request, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<StoreSession>().is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_utils::create_test_app_state;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[tokio::test]
    async fn test_find_store_session() {
        let (state, _) = create_test_app_state().await;

        let session = find_store_session(&state, "test-storefront-token-outlet").unwrap();
        assert_eq!(session.store_id, "outlet");
        assert_eq!(session.shop_domain, "outlet.myshopify.com");
        assert_eq!(session.admin_access_token.expose_secret(), "shpat_test_outlet");

        assert!(find_store_session(&state, "test-storefront-token").is_none());
        assert!(find_store_session(&state, "").is_none());
    }
}
