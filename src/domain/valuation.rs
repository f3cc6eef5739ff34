//! Claim valuation value objects: cost/rate provenance, dimensions, tiers.

use crate::domain::{Currency, Decimal, Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// Where a unit cost was resolved from, in cascade priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Matched a parsed supplier invoice line item.
    Invoice,
    /// Seller catalog unit cost.
    Catalog,
    /// Margin estimate from historical average sale price.
    OrderHistory,
    /// Flat default when nothing else resolved.
    Default,
}

impl CostSource {
    /// Confidence contributed by each resolution tier.
    pub fn confidence(&self) -> f64 {
        match self {
            CostSource::Invoice => 0.95,
            CostSource::Catalog => 0.85,
            CostSource::OrderHistory => 0.60,
            CostSource::Default => 0.30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CostSource::Invoice => "invoice",
            CostSource::Catalog => "catalog",
            CostSource::OrderHistory => "order_history",
            CostSource::Default => "default",
        }
    }
}

/// Provenance of a resolved exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Same currency in and out.
    Identity,
    /// Served from the memory or durable cache.
    Cached,
    /// Fetched from the live provider on this call.
    Live,
    /// Static fallback table of common pairs.
    Static,
    /// Last-resort identity rate for an unknown pair.
    Default,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Identity => "identity",
            RateSource::Cached => "cached",
            RateSource::Live => "live",
            RateSource::Static => "static",
            RateSource::Default => "default",
        }
    }
}

/// Physical package dimensions in pounds and inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub weight_lb: Decimal,
    pub length_in: Decimal,
    pub width_in: Decimal,
    pub height_in: Decimal,
}

/// Industry volumetric divisor for dimensional weight (cubic inches per lb).
const DIM_WEIGHT_DIVISOR: i64 = 139;

impl Dimensions {
    /// Placeholder used when the catalog has no dimension data: 1 lb, 10x8x4 in.
    pub fn placeholder() -> Self {
        Dimensions {
            weight_lb: Decimal::ONE,
            length_in: Decimal::from_i64(10),
            width_in: Decimal::from_i64(8),
            height_in: Decimal::from_i64(4),
        }
    }

    /// Dimensional weight in pounds: (L x W x H) / 139.
    pub fn dimensional_weight_lb(&self) -> Decimal {
        (self.length_in * self.width_in * self.height_in) / Decimal::from_i64(DIM_WEIGHT_DIVISOR)
    }

    /// Billable weight: the greater of actual and dimensional weight.
    pub fn billable_weight_lb(&self) -> Decimal {
        self.weight_lb.max(self.dimensional_weight_lb())
    }

    /// Billable weight expressed in ounces.
    pub fn billable_weight_oz(&self) -> Decimal {
        self.billable_weight_lb() * Decimal::from_i64(16)
    }

    pub fn longest_side_in(&self) -> Decimal {
        self.length_in.max(self.width_in).max(self.height_in)
    }

    /// Girth: longest side + 2 x (sum of the two shorter sides).
    pub fn girth_in(&self) -> Decimal {
        let longest = self.longest_side_in();
        let perimeter_sides =
            self.length_in + self.width_in + self.height_in - longest;
        longest + perimeter_sides * Decimal::from_i64(2)
    }
}

/// Marketplace size tier used for fulfillment fee lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    SmallStandard,
    /// Large standard, four weight bands.
    LargeStandardUpTo1Lb,
    LargeStandardUpTo2Lb,
    LargeStandardUpTo3Lb,
    LargeStandardOver3Lb,
    SmallOversize,
    MediumOversize,
    LargeOversize,
    SpecialOversize,
}

impl SizeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::SmallStandard => "small_standard",
            SizeTier::LargeStandardUpTo1Lb => "large_standard_1lb",
            SizeTier::LargeStandardUpTo2Lb => "large_standard_2lb",
            SizeTier::LargeStandardUpTo3Lb => "large_standard_3lb",
            SizeTier::LargeStandardOver3Lb => "large_standard_heavy",
            SizeTier::SmallOversize => "small_oversize",
            SizeTier::MediumOversize => "medium_oversize",
            SizeTier::LargeOversize => "large_oversize",
            SizeTier::SpecialOversize => "special_oversize",
        }
    }
}

/// Raw facts a detection carries into valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimFacts {
    pub sku: Sku,
    pub quantity: i64,
    pub event_date: TimeMs,
    /// Fee actually charged on the underlying event, when known.
    pub charged_fee: Option<Decimal>,
    pub category: Option<String>,
    pub sale_price: Option<Decimal>,
    pub currency: Currency,
}

/// The maximum defensible recovery amount for one detection.
///
/// Owned by the caller that requested it; never cached or shared across
/// calls (its inputs are, via the cost and FX caches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimValuation {
    pub unit_cost: Decimal,
    pub cost_source: CostSource,
    pub cost_confidence: f64,
    pub quantity: i64,
    pub fee_overcharge_per_unit: Decimal,
    /// unit_cost x quantity.
    pub base_value: Decimal,
    /// max(0, charged - expected fee) x quantity.
    pub fee_recovery: Decimal,
    /// base_value + fee_recovery, in the source currency.
    pub total_value: Decimal,
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub exchange_rate: Decimal,
    pub rate_source: RateSource,
    /// total_value converted to the target currency.
    pub converted_value: Decimal,
    pub valuation_confidence: f64,
    /// Human-readable trail of how each component was resolved.
    pub method_notes: Vec<String>,
}
