//! Listing performance metrics with embedded daily series.

use crate::domain::{Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// One day of listing metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyListingMetrics {
    pub date: TimeMs,
    pub units_sold: i64,
    /// Sessions/page views, when the seller's plan tracks traffic.
    pub page_views: Option<i64>,
    /// Share of the buy box held that day, 0.0-1.0.
    pub buy_box_pct: Option<f64>,
}

/// Performance series for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPerformance {
    pub sku: Sku,
    pub asin: Option<String>,
    pub listing_active: bool,
    pub fba_eligible: bool,
    /// Marketplace-reported issue flags on the listing (e.g. "pricing_error",
    /// "restricted_keyword").
    pub issue_flags: Vec<String>,
    /// Daily metrics, oldest first.
    pub daily: Vec<DailyListingMetrics>,
}

impl ListingPerformance {
    /// Days of daily history available.
    pub fn history_days(&self) -> usize {
        self.daily.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_days() {
        let listing = ListingPerformance {
            sku: Sku::new("SKU-1"),
            asin: None,
            listing_active: true,
            fba_eligible: true,
            issue_flags: vec![],
            daily: (0..21)
                .map(|i| DailyListingMetrics {
                    date: TimeMs::new(i * 86_400_000),
                    units_sold: 3,
                    page_views: None,
                    buy_box_pct: None,
                })
                .collect(),
        };
        assert_eq!(listing.history_days(), 21);
    }
}
