//! Commerce platform integration: the Admin GraphQL discount client.

pub mod code;
pub mod shopify;

pub use shopify::ShopifyDiscountClient;
