use opentelemetry::metrics::{Counter, Meter};

/// Instruments for discount issuance and request limiting.
#[derive(Clone)]
pub struct PopgateMetrics {
    pub discounts_issued: Counter<u64>,
    pub discounts_created: Counter<u64>,
    pub issuance_failures: Counter<u64>,
    pub cache_conflicts: Counter<u64>,

    pub rate_limit_hits_total: Counter<u64>,
    pub rate_limit_hits_by_tier: Counter<u64>,
}

impl PopgateMetrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            discounts_issued: meter
                .u64_counter("popgate.discounts.issued")
                .with_description("Discount codes handed to shoppers")
                .build(),

            discounts_created: meter
                .u64_counter("popgate.discounts.created")
                .with_description("Discount codes created on the commerce platform")
                .build(),

            issuance_failures: meter
                .u64_counter("popgate.discounts.failures")
                .with_description("Failed issuance requests by error kind")
                .build(),

            cache_conflicts: meter
                .u64_counter("popgate.discounts.cache_conflicts")
                .with_description("Created codes that lost the cache write to a concurrent request")
                .build(),

            rate_limit_hits_total: meter
                .u64_counter("popgate.rate_limit.hits")
                .with_description("Requests rejected by a rate limit")
                .build(),

            rate_limit_hits_by_tier: meter
                .u64_counter("popgate.rate_limit.hits_by_tier")
                .with_description("Requests rejected by a rate limit, per tier")
                .build(),
        }
    }
}
