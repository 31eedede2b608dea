use crate::utils::secret::MaskedSecret;

/// An authenticated storefront, resolved from the request's bearer token.
///
/// Carries what is needed to talk to the store's commerce backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSession {
    pub store_id: String,
    pub shop_domain: String,
    pub admin_access_token: MaskedSecret,
}

impl StoreSession {
    pub fn new(store_id: &str, shop_domain: &str, admin_access_token: MaskedSecret) -> Self {
        Self {
            store_id: store_id.to_string(),
            shop_domain: shop_domain.to_string(),
            admin_access_token,
        }
    }
}
