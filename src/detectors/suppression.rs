//! Silent listing suppression detection.
//!
//! A listing can stop selling without the marketplace telling the seller:
//! search suppression, buy-box loss, eligibility flags. A 30-day baseline
//! against the trailing 7-day window surfaces listings whose sales cratered
//! while the listing nominally stayed active. At least two independent
//! signals (or one catastrophic sales drop) are required before emitting.

use super::{gate_and_rank, DetectionDataset, Detector};
use crate::domain::{
    AnomalyType, Currency, Decimal, DetectionResult, Evidence, ListingPerformance, SellerId,
    Severity, SyncId,
};

/// Minimum daily history before the comparison is meaningful.
const MIN_HISTORY_DAYS: usize = 14;
/// Trailing comparison window.
const CURRENT_WINDOW_DAYS: usize = 7;
/// Baseline window capped at this many days before the current window.
const BASELINE_WINDOW_DAYS: usize = 30;

/// Signal thresholds.
const SALES_DROP_SIGNAL: f64 = 0.50;
const BUY_BOX_DROP_SIGNAL: f64 = 0.30;
const TRAFFIC_DROP_SIGNAL: f64 = 0.40;
/// A sales drop this deep stands on its own.
const SOLO_SALES_DROP: f64 = 0.70;
/// Baseline under this many units/day is too thin to judge zero sales.
const NONTRIVIAL_BASELINE_DAILY: f64 = 0.5;
/// Minimum concurrent signals before emitting.
const MIN_SIGNALS: usize = 2;

/// Listing issue flags known to trigger search suppression.
const SUPPRESSION_TRIGGER_FLAGS: [&str; 5] = [
    "pricing_error",
    "potential_pricing_error",
    "restricted_keyword",
    "listing_policy_violation",
    "image_policy_violation",
];

const MIN_VALUE_USD: i64 = 25;
const SHOW_THRESHOLD: f64 = 0.55;

pub struct SilentSuppressionDetector;

struct WindowAverages {
    sales: f64,
    buy_box: Option<f64>,
    page_views: Option<f64>,
}

impl SilentSuppressionDetector {
    fn averages(days: &[&crate::domain::DailyListingMetrics]) -> WindowAverages {
        let n = days.len() as f64;
        let sales = days.iter().map(|d| d.units_sold as f64).sum::<f64>() / n;

        let buy_box_days: Vec<f64> = days.iter().filter_map(|d| d.buy_box_pct).collect();
        let buy_box = if buy_box_days.is_empty() {
            None
        } else {
            Some(buy_box_days.iter().sum::<f64>() / buy_box_days.len() as f64)
        };

        let view_days: Vec<f64> = days
            .iter()
            .filter_map(|d| d.page_views.map(|v| v as f64))
            .collect();
        let page_views = if view_days.is_empty() {
            None
        } else {
            Some(view_days.iter().sum::<f64>() / view_days.len() as f64)
        };

        WindowAverages {
            sales,
            buy_box,
            page_views,
        }
    }

    fn drop_ratio(baseline: f64, current: f64) -> f64 {
        if baseline <= 0.0 {
            0.0
        } else {
            ((baseline - current) / baseline).max(0.0)
        }
    }

    /// First post-baseline day selling below half the baseline average.
    fn suppression_start(
        listing: &ListingPerformance,
        baseline_len: usize,
        baseline_avg: f64,
    ) -> Option<String> {
        listing
            .daily
            .iter()
            .skip(baseline_len)
            .find(|d| (d.units_sold as f64) < 0.5 * baseline_avg)
            .map(|d| d.date.day_key())
    }

    fn confidence_for(signals: &[&'static str], sales_drop: f64) -> f64 {
        let base: f64 = match signals.len() {
            0 | 1 => 0.70, // only reachable via the solo catastrophic drop
            2 => 0.65,
            3 => 0.75,
            4 => 0.85,
            _ => 0.90,
        };
        if sales_drop >= SOLO_SALES_DROP {
            (base + 0.05).min(0.95)
        } else {
            base
        }
    }
}

impl Detector for SilentSuppressionDetector {
    fn name(&self) -> &'static str {
        "silent_suppression"
    }

    fn min_value(&self) -> Decimal {
        Decimal::from_i64(MIN_VALUE_USD)
    }

    fn show_threshold(&self) -> f64 {
        SHOW_THRESHOLD
    }

    fn detect(
        &self,
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
    ) -> Vec<DetectionResult> {
        let mut results = Vec::new();

        for listing in &data.listings {
            if listing.history_days() < MIN_HISTORY_DAYS {
                continue;
            }

            let split = listing.daily.len() - CURRENT_WINDOW_DAYS;
            let baseline_start = split.saturating_sub(BASELINE_WINDOW_DAYS);
            let baseline_days: Vec<_> = listing.daily[baseline_start..split].iter().collect();
            let current_days: Vec<_> = listing.daily[split..].iter().collect();
            let baseline = Self::averages(&baseline_days);
            let current = Self::averages(&current_days);

            let sales_drop = Self::drop_ratio(baseline.sales, current.sales);

            let mut signals: Vec<&'static str> = Vec::new();
            if sales_drop >= SALES_DROP_SIGNAL {
                signals.push("sales_drop");
            }
            if let (Some(base), Some(cur)) = (baseline.buy_box, current.buy_box) {
                if Self::drop_ratio(base, cur) >= BUY_BOX_DROP_SIGNAL {
                    signals.push("buy_box_drop");
                }
            }
            if let (Some(base), Some(cur)) = (baseline.page_views, current.page_views) {
                if Self::drop_ratio(base, cur) >= TRAFFIC_DROP_SIGNAL {
                    signals.push("traffic_drop");
                }
            }
            if !listing.fba_eligible && listing.listing_active {
                signals.push("fba_eligibility_lost");
            }
            let trigger_flags: Vec<&String> = listing
                .issue_flags
                .iter()
                .filter(|f| SUPPRESSION_TRIGGER_FLAGS.contains(&f.as_str()))
                .collect();
            if !trigger_flags.is_empty() {
                signals.push("suppression_trigger_flags");
            }
            let zero_sales =
                current.sales == 0.0 && baseline.sales >= NONTRIVIAL_BASELINE_DAILY;
            if zero_sales {
                signals.push("zero_sales");
            }

            let solo_catastrophic = sales_drop >= SOLO_SALES_DROP;
            if signals.len() < MIN_SIGNALS && !solo_catastrophic {
                continue;
            }

            let (unit_value, _) = data.estimate_unit_value(&listing.sku);
            let daily_gap = baseline.sales - current.sales;
            let weekly_loss =
                Decimal::from_f64_lossy(daily_gap) * unit_value * Decimal::from_i64(7);

            let confidence = Self::confidence_for(&signals, sales_drop);
            let suppression_start = Self::suppression_start(listing, split, baseline.sales);

            let mut evidence = Evidence::new()
                .reason(format!(
                    "listing {} sales dropped {:.0}% against its 30-day baseline",
                    listing.sku,
                    sales_drop * 100.0
                ))
                .field("signals", serde_json::json!(signals))
                .field("baseline_daily_sales", serde_json::json!(baseline.sales))
                .field("current_daily_sales", serde_json::json!(current.sales))
                .field("sales_drop", serde_json::json!(sales_drop))
                .field("weekly_unit_gap", serde_json::json!(daily_gap * 7.0))
                .field("unit_value", serde_json::json!(unit_value));
            if let Some(start) = &suppression_start {
                evidence = evidence.field("suppression_start", serde_json::json!(start));
            }
            if !trigger_flags.is_empty() {
                evidence = evidence.field(
                    "issue_flags",
                    serde_json::json!(trigger_flags
                        .iter()
                        .map(|f| f.to_string())
                        .collect::<Vec<_>>()),
                );
            }

            let mut result = DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::ListingSuppression,
                weekly_loss,
                Currency::usd(),
                confidence,
                evidence,
                vec![listing.sku.0.clone()],
                data.as_of,
            );
            if zero_sales {
                result = result.with_severity(Severity::from_value(&weekly_loss).promote());
            }
            results.push(result);
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DailyListingMetrics, Sku, TimeMs};

    fn as_of() -> TimeMs {
        TimeMs::new(1_750_000_000_000)
    }

    /// `daily(sales, views, buy_box)` tuples, oldest first.
    fn listing(days: Vec<(i64, Option<i64>, Option<f64>)>) -> ListingPerformance {
        let n = days.len() as i64;
        ListingPerformance {
            sku: Sku::new("SKU-1"),
            asin: None,
            listing_active: true,
            fba_eligible: true,
            issue_flags: vec![],
            daily: days
                .into_iter()
                .enumerate()
                .map(|(i, (units_sold, page_views, buy_box_pct))| DailyListingMetrics {
                    date: as_of().minus_days(n - 1 - i as i64),
                    units_sold,
                    page_views,
                    buy_box_pct,
                })
                .collect(),
        }
    }

    fn detect(listings: Vec<ListingPerformance>) -> Vec<DetectionResult> {
        let data = DetectionDataset {
            as_of: as_of(),
            listings,
            ..Default::default()
        };
        SilentSuppressionDetector.detect(&SellerId::new("S1"), &SyncId::new("sync"), &data)
    }

    fn steady_then_drop(baseline: i64, current: i64) -> Vec<(i64, Option<i64>, Option<f64>)> {
        let mut days: Vec<(i64, Option<i64>, Option<f64>)> =
            (0..21).map(|_| (baseline, None, None)).collect();
        days.extend((0..7).map(|_| (current, None, None)));
        days
    }

    #[test]
    fn test_zero_sales_with_healthy_baseline_detected() {
        // 5/day baseline to zero: sales_drop + zero_sales signals.
        let results = detect(vec![listing(steady_then_drop(5, 0))]);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.anomaly_type, AnomalyType::ListingSuppression);
        // 5 units/day gap x $20 x 7 days.
        assert_eq!(result.estimated_value, Decimal::parse("700").unwrap());
        let signals = result.evidence.fields["signals"].as_array().unwrap();
        assert!(signals.contains(&serde_json::json!("zero_sales")));
        // Zero sales promotes the value band.
        assert_eq!(result.severity, Severity::Critical);
    }

    #[test]
    fn test_moderate_drop_single_signal_not_emitted() {
        // 40% drop: below both the 50% signal and the solo threshold.
        let results = detect(vec![listing(steady_then_drop(10, 6))]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_catastrophic_sales_drop_alone_emits() {
        // 80% drop with no second signal.
        let results = detect(vec![listing(steady_then_drop(10, 2))]);
        assert_eq!(results.len(), 1);
        assert!((results[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_buy_box_loss_plus_sales_drop() {
        let mut days: Vec<(i64, Option<i64>, Option<f64>)> =
            (0..21).map(|_| (10, None, Some(0.9))).collect();
        days.extend((0..7).map(|_| (4, None, Some(0.4))));
        let results = detect(vec![listing(days)]);
        assert_eq!(results.len(), 1);
        let signals = results[0].evidence.fields["signals"].as_array().unwrap();
        assert!(signals.contains(&serde_json::json!("sales_drop")));
        assert!(signals.contains(&serde_json::json!("buy_box_drop")));
    }

    #[test]
    fn test_traffic_drop_signal() {
        let mut days: Vec<(i64, Option<i64>, Option<f64>)> =
            (0..21).map(|_| (10, Some(200), None)).collect();
        days.extend((0..7).map(|_| (4, Some(80), None)));
        let results = detect(vec![listing(days)]);
        assert_eq!(results.len(), 1);
        let signals = results[0].evidence.fields["signals"].as_array().unwrap();
        assert!(signals.contains(&serde_json::json!("traffic_drop")));
    }

    #[test]
    fn test_fba_loss_and_trigger_flags_count_as_signals() {
        let mut l = listing(steady_then_drop(10, 4));
        l.fba_eligible = false;
        l.issue_flags = vec!["pricing_error".to_string()];
        let results = detect(vec![l]);
        assert_eq!(results.len(), 1);
        let signals = results[0].evidence.fields["signals"].as_array().unwrap();
        assert!(signals.contains(&serde_json::json!("fba_eligibility_lost")));
        assert!(signals.contains(&serde_json::json!("suppression_trigger_flags")));
        // Three signals: sales drop, FBA loss, trigger flags.
        assert!((results[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_short_history_skipped() {
        let days: Vec<(i64, Option<i64>, Option<f64>)> =
            (0..10).map(|_| (10, None, None)).collect();
        assert!(detect(vec![listing(days)]).is_empty());
    }

    #[test]
    fn test_suppression_start_recorded() {
        let results = detect(vec![listing(steady_then_drop(5, 0))]);
        let start = results[0].evidence.fields["suppression_start"]
            .as_str()
            .unwrap();
        // First zero-sales day is 6 days before as_of.
        assert_eq!(start, as_of().minus_days(6).day_key());
    }

    #[test]
    fn test_healthy_listing_not_flagged() {
        assert!(detect(vec![listing(steady_then_drop(10, 10))]).is_empty());
    }
}
