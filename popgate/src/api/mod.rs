pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limiting;
pub mod router;

#[cfg(test)]
pub(crate) mod test_utils;
