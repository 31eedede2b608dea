//! popgate server library
//!
//! The binary is a thin wrapper; everything lives here so route tests can
//! build the router directly.

pub mod api;
pub mod app_state;
pub mod challenge;
pub mod commerce;
pub mod http;
pub mod init_telemetry;
pub mod limiter;
pub mod metrics;
pub mod seed;
pub mod settings;
pub mod stop_flag;

pub use app_state::AppState;
