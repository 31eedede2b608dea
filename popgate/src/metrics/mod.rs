//! OpenTelemetry metrics for popgate
//!
//! Recording is a no-op until `init_metrics` ran, so code paths can record
//! unconditionally.

mod init;
mod instruments;

use std::sync::OnceLock;

use opentelemetry::KeyValue;

pub use init::init_metrics;
pub use instruments::PopgateMetrics;

/// Global metrics instance
static METRICS: OnceLock<PopgateMetrics> = OnceLock::new();

/// Get the global metrics instance if initialized
pub fn get_metrics() -> Option<&'static PopgateMetrics> {
    METRICS.get()
}

/// Set the global metrics instance (called during initialization)
pub(crate) fn set_metrics(metrics: PopgateMetrics) {
    let _ = METRICS.set(metrics);
}

/// A code was handed to a shopper; `outcome` is `cached`, `created` or `race_lost`.
pub fn record_discount_issued(campaign_id: &str, outcome: &'static str) {
    if let Some(m) = get_metrics() {
        let attributes = [
            KeyValue::new("campaign_id", campaign_id.to_string()),
            KeyValue::new("outcome", outcome),
        ];
        m.discounts_issued.add(1, &attributes);
        match outcome {
            "created" => m.discounts_created.add(1, &attributes[..1]),
            "race_lost" => m.cache_conflicts.add(1, &attributes[..1]),
            _ => {}
        }
    }
}

pub fn record_issuance_failure(kind: &'static str) {
    if let Some(m) = get_metrics() {
        m.issuance_failures.add(1, &[KeyValue::new("kind", kind)]);
    }
}
