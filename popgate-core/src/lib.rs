pub mod campaigns;
pub mod discounts;
pub mod http;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
