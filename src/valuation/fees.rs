//! Fulfillment fee schedule and referral rates.
//!
//! Fixed base fee per size tier plus marginal weight surcharges past
//! tier-specific thresholds; referral fee is a flat category percentage of
//! the sale price.

use crate::domain::{Decimal, Dimensions, SizeTier};

/// Default referral rate when the category is unknown.
const DEFAULT_REFERRAL_RATE: &str = "0.15";

struct TierFee {
    base: &'static str,
    /// Surcharge per increment of billable weight past the threshold.
    surcharge: &'static str,
    /// Billable weight included in the base fee, in ounces.
    included_oz: i64,
    /// Surcharge increment size, in ounces.
    increment_oz: i64,
}

fn tier_fee(tier: SizeTier) -> TierFee {
    match tier {
        SizeTier::SmallStandard => TierFee {
            base: "3.22",
            surcharge: "0",
            included_oz: 16,
            increment_oz: 16,
        },
        SizeTier::LargeStandardUpTo1Lb => TierFee {
            base: "4.16",
            surcharge: "0",
            included_oz: 16,
            increment_oz: 16,
        },
        SizeTier::LargeStandardUpTo2Lb => TierFee {
            base: "4.95",
            surcharge: "0",
            included_oz: 32,
            increment_oz: 16,
        },
        SizeTier::LargeStandardUpTo3Lb => TierFee {
            base: "5.68",
            surcharge: "0",
            included_oz: 48,
            increment_oz: 16,
        },
        // Past 3 lb: 16 cents per additional half pound.
        SizeTier::LargeStandardOver3Lb => TierFee {
            base: "6.92",
            surcharge: "0.16",
            included_oz: 48,
            increment_oz: 8,
        },
        // Oversize tiers: per-pound surcharges past the first pound.
        SizeTier::SmallOversize => TierFee {
            base: "9.73",
            surcharge: "0.42",
            included_oz: 16,
            increment_oz: 16,
        },
        SizeTier::MediumOversize => TierFee {
            base: "19.05",
            surcharge: "0.42",
            included_oz: 16,
            increment_oz: 16,
        },
        SizeTier::LargeOversize => TierFee {
            base: "89.98",
            surcharge: "0.83",
            included_oz: 90 * 16,
            increment_oz: 16,
        },
        SizeTier::SpecialOversize => TierFee {
            base: "158.49",
            surcharge: "0.83",
            included_oz: 90 * 16,
            increment_oz: 16,
        },
    }
}

/// Per-unit fulfillment fee for a package.
pub fn fulfillment_fee(tier: SizeTier, dims: &Dimensions) -> Decimal {
    let fee = tier_fee(tier);
    let base = Decimal::parse(fee.base).unwrap_or(Decimal::ZERO);
    let surcharge = Decimal::parse(fee.surcharge).unwrap_or(Decimal::ZERO);
    if surcharge.is_zero() {
        return base;
    }

    let billable_oz = dims.billable_weight_oz();
    let excess_oz = billable_oz - Decimal::from_i64(fee.included_oz);
    if !excess_oz.is_positive() {
        return base;
    }

    // Round increments up: any partial increment bills in full.
    let increments = (excess_oz / Decimal::from_i64(fee.increment_oz)).inner().ceil();
    base + surcharge * Decimal::new(increments)
}

/// Referral fee: sale price x category rate.
pub fn referral_fee(sale_price: Decimal, category: Option<&str>) -> Decimal {
    sale_price * referral_rate(category)
}

/// Category referral rate; fixed lookup with a 15% default.
pub fn referral_rate(category: Option<&str>) -> Decimal {
    let rate = match category.map(|c| c.to_ascii_lowercase()) {
        Some(c) if c.contains("electronics") || c.contains("camera") || c.contains("computer") => {
            "0.08"
        }
        Some(c) if c.contains("grocery") => "0.08",
        Some(c) if c.contains("apparel") || c.contains("clothing") || c.contains("shoes") => {
            "0.17"
        }
        Some(c) if c.contains("jewelry") || c.contains("watches") => "0.20",
        _ => DEFAULT_REFERRAL_RATE,
    };
    Decimal::parse(rate).unwrap_or(Decimal::ZERO)
}

/// Expected total per-unit fee for a sale: fulfillment plus referral.
pub fn expected_unit_fee(
    tier: SizeTier,
    dims: &Dimensions,
    sale_price: Option<Decimal>,
    category: Option<&str>,
) -> Decimal {
    let fulfillment = fulfillment_fee(tier, dims);
    match sale_price {
        Some(price) if price.is_positive() => fulfillment + referral_fee(price, category),
        _ => fulfillment,
    }
}
