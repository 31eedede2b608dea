pub mod api_server;
pub mod challenge;
pub mod commerce;
pub mod discounts;
pub mod rate_limiting;
