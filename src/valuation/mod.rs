//! Claim value calculation: cost cascade, dimensional math, fee schedule,
//! and currency conversion.

pub mod calculator;
pub mod cost;
pub mod dimensions;
pub mod fees;
pub mod fx;
pub mod live_rates;

pub use calculator::ClaimValueCalculator;
pub use cost::{resolve_unit_cost, CostCache, CostResolution};
pub use dimensions::{classify_size_tier, resolve_dimensions, DimensionResolution};
pub use fees::{expected_unit_fee, fulfillment_fee, referral_fee, referral_rate};
pub use fx::{static_rate, FxConverter, LiveRateSource, RateError, RateResolution};
pub use live_rates::HttpRateSource;
