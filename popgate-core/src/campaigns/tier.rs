use serde::{Deserialize, Serialize};

use super::discount_config::CachedCode;

/// A subtotal bracket of a tiered ("spend more, save more") discount.
///
/// `value` is a percentage. The cached `code` is filled in lazily the first
/// time a shopper lands in this bracket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscountTier {
    pub min_subtotal_cents: u64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CachedCode>,
}

impl DiscountTier {
    pub fn new(min_subtotal_cents: u64, value: f64) -> Self {
        Self {
            min_subtotal_cents,
            value,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(CachedCode::new(code));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSelection<'a> {
    /// Position of the tier in the slice handed to [`select_tier`]
    pub index: usize,
    pub tier: &'a DiscountTier,
}

/// Pick the tier with the largest `min_subtotal_cents` not above the cart
/// subtotal.
///
/// The slice is never trusted to be sorted: tiers are ordered by threshold
/// through an index permutation, so the returned `index` always refers to the
/// caller's slice. A missing or zero subtotal, or one below every threshold,
/// falls back to the lowest tier. Returns `None` only for an empty slice.
pub fn select_tier(tiers: &[DiscountTier], cart_subtotal_cents: Option<u64>) -> Option<TierSelection<'_>> {
    let mut order: Vec<usize> = (0..tiers.len()).collect();
    order.sort_by_key(|&i| tiers[i].min_subtotal_cents);

    let fallback = *order.first()?;
    let chosen = match cart_subtotal_cents {
        Some(subtotal) if subtotal > 0 => order
            .iter()
            .rev()
            .copied()
            .find(|&i| tiers[i].min_subtotal_cents <= subtotal)
            .unwrap_or(fallback),
        _ => fallback,
    };

    Some(TierSelection {
        index: chosen,
        tier: &tiers[chosen],
    })
}
