use opentelemetry::KeyValue;

use crate::metrics;

/// Count a request rejected by the limiter of `tier`.
pub fn record_rate_limit_hit(tier: &'static str) {
    if let Some(m) = metrics::get_metrics() {
        m.rate_limit_hits_total.add(1, &[]);
        m.rate_limit_hits_by_tier
            .add(1, &[KeyValue::new("tier", tier)]);
    }
}
