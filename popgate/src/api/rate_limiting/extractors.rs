use axum::http::Request;
use tower_governor::key_extractor::KeyExtractor;
use tower_governor::GovernorError;

/// Rate limit key taken from the bearer token, so each store is limited
/// on its own rather than per IP address.
#[derive(Clone, Copy, Debug)]
pub struct BearerTokenExtractor;

impl KeyExtractor for BearerTokenExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.headers()
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            // The first 32 chars are enough to tell tokens apart.
            .map(|token| token.chars().take(32).collect())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}
