//! Inventory shrinkage drift detection.
//!
//! Per SKU, rolling 7/30/90-day windows over ordered snapshots reconcile the
//! reported ending quantity against what logged events (orders, restocks,
//! adjustments, removals, inbound receipts) predict. Quantity that vanishes
//! with no logged cause is shrinkage.

use super::{gate_and_rank, ConfidenceFactors, DetectionDataset, Detector};
use crate::domain::{
    AdjustmentKind, AnomalyType, Decimal, DetectionResult, Evidence, InventorySnapshot, SellerId,
    Severity, Sku, SyncId,
};
use std::collections::BTreeMap;

const WINDOW_DAYS: [i64; 3] = [7, 30, 90];
/// Minimum snapshots for a SKU to be analyzable at all.
const MIN_SNAPSHOTS: usize = 5;
/// Snapshot count in the 30-day window for the continuity factor (~70% of days).
const CONTINUOUS_SNAPSHOT_COUNT: usize = 21;
/// Fewer logged events than this with a loss over two units reads as
/// loss-without-cause.
const LOW_EVENT_COUNT: usize = 3;
/// Any window losing at least this many unexplained units is reportable.
const REPORTABLE_LOSS_UNITS: i64 = 5;
/// 7-day loss rate above this multiple of the 30-day rate is accelerating.
const ACCELERATION_RATIO: f64 = 1.5;
/// Unit value at or above this marks the high-value confidence factor.
const HIGH_UNIT_VALUE_USD: i64 = 50;

const MIN_VALUE_USD: i64 = 25;
const SHOW_THRESHOLD: f64 = 0.55;

/// How the loss pattern presents across windows, in classification
/// precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftKind {
    /// Consistent loss across all windows with low rate variance.
    Systematic,
    /// Recent loss rate well above the monthly rate.
    Accelerating,
    /// Loss with almost no logged events to explain it.
    NonEvent,
    /// Adjustments account for most of the decline but lack provenance.
    UnexplainedAdjustment,
}

impl DriftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftKind::Systematic => "systematic",
            DriftKind::Accelerating => "accelerating",
            DriftKind::NonEvent => "non_event",
            DriftKind::UnexplainedAdjustment => "unexplained_adjustment",
        }
    }
}

/// Reconciliation of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub days: i64,
    pub starting: i64,
    pub ending: i64,
    pub expected_ending: i64,
    /// ending - expected_ending; negative means unexplained loss.
    pub unexplained_delta: i64,
    /// |unexplained_delta| / starting.
    pub shrinkage_rate: f64,
    pub event_count: usize,
    pub snapshot_count: usize,
    /// Net signed non-restock adjustments in the window.
    pub adjustments_net: i64,
    /// Whether any damage/lost adjustment corroborates physical loss.
    pub has_loss_events: bool,
}

impl WindowStats {
    /// Average unexplained units lost per day (negative = loss).
    pub fn daily_rate(&self) -> f64 {
        self.unexplained_delta as f64 / self.days as f64
    }
}

pub struct ShrinkageDriftDetector;

impl ShrinkageDriftDetector {
    fn window_stats(
        data: &DetectionDataset,
        sku: &Sku,
        snapshots: &[&InventorySnapshot],
        days: i64,
    ) -> Option<WindowStats> {
        let window_start = data.as_of.minus_days(days);
        let in_window: Vec<_> = snapshots
            .iter()
            .filter(|s| s.snapshot_date >= window_start)
            .collect();
        if in_window.len() < 2 {
            return None;
        }

        let first = in_window.first().expect("non-empty");
        let last = in_window.last().expect("non-empty");
        let starting = first.quantity_on_hand;
        let ending = last.quantity_on_hand;
        let span = (first.snapshot_date, last.snapshot_date);

        let orders_out: i64 = data
            .orders
            .iter()
            .filter(|o| &o.sku == sku && o.order_date > span.0 && o.order_date <= span.1)
            .map(|o| o.quantity_shipped)
            .sum();

        let mut restocks = 0i64;
        let mut adjustments_net = 0i64;
        let mut has_loss_events = false;
        let mut adjustment_count = 0usize;
        for adj in data
            .adjustments
            .iter()
            .filter(|a| &a.sku == sku && a.adjustment_date > span.0 && a.adjustment_date <= span.1)
        {
            adjustment_count += 1;
            match adj.kind {
                AdjustmentKind::CustomerReturn => restocks += adj.quantity_delta,
                kind => {
                    adjustments_net += adj.quantity_delta;
                    if matches!(kind, AdjustmentKind::Damaged | AdjustmentKind::Lost) {
                        has_loss_events = true;
                    }
                }
            }
        }

        let removal_events: Vec<_> = data
            .removals
            .iter()
            .filter(|r| &r.sku == sku && r.removal_date > span.0 && r.removal_date <= span.1)
            .collect();
        let removals: i64 = removal_events.iter().map(|r| r.quantity).sum();

        // Inbound pipeline draining into on-hand stock counts as receipts.
        let inbound_received = (first.quantity_inbound - last.quantity_inbound).max(0);

        let order_count = data
            .orders
            .iter()
            .filter(|o| &o.sku == sku && o.order_date > span.0 && o.order_date <= span.1)
            .count();

        let expected_ending =
            starting - orders_out + restocks + adjustments_net - removals + inbound_received;
        let unexplained_delta = ending - expected_ending;
        let shrinkage_rate = if starting > 0 {
            unexplained_delta.unsigned_abs() as f64 / starting as f64
        } else {
            0.0
        };

        Some(WindowStats {
            days,
            starting,
            ending,
            expected_ending,
            unexplained_delta,
            shrinkage_rate,
            event_count: order_count + adjustment_count + removal_events.len(),
            snapshot_count: in_window.len(),
            adjustments_net,
            has_loss_events,
        })
    }

    /// Classify the drift pattern; `None` means nothing reportable.
    fn classify(
        w7: Option<&WindowStats>,
        w30: &WindowStats,
        w90: Option<&WindowStats>,
    ) -> Option<DriftKind> {
        // Systematic: every window loses and the daily rates barely vary.
        if let (Some(w7), Some(w90)) = (w7, w90) {
            let all_negative = w7.unexplained_delta < 0
                && w30.unexplained_delta < 0
                && w90.unexplained_delta < 0;
            if all_negative {
                let rates = [w7.daily_rate(), w30.daily_rate(), w90.daily_rate()];
                let mean = rates.iter().sum::<f64>() / rates.len() as f64;
                let variance = rates
                    .iter()
                    .map(|r| (r - mean).powi(2))
                    .sum::<f64>()
                    / rates.len() as f64;
                if variance.sqrt() <= 0.5 * mean.abs() {
                    return Some(DriftKind::Systematic);
                }
            }
        }

        // Accelerating: the last week is losing much faster than the month.
        if let Some(w7) = w7 {
            if w7.unexplained_delta < 0
                && w30.unexplained_delta < 0
                && w7.daily_rate().abs() > ACCELERATION_RATIO * w30.daily_rate().abs()
            {
                return Some(DriftKind::Accelerating);
            }
        }

        // Loss with almost nothing logged that could explain it.
        if w30.event_count < LOW_EVENT_COUNT && w30.unexplained_delta < -2 {
            return Some(DriftKind::NonEvent);
        }

        // Adjustments explain at least half of the raw decline.
        let raw_change = w30.ending - w30.starting;
        if raw_change < 0
            && w30.adjustments_net.unsigned_abs() * 2 >= raw_change.unsigned_abs()
            && w30.adjustments_net != 0
            && w30.unexplained_delta < 0
        {
            return Some(DriftKind::UnexplainedAdjustment);
        }

        // Any window with a reportable unexplained loss still surfaces.
        let windows = [Some(w30), w7, w90];
        if windows
            .iter()
            .flatten()
            .any(|w| w.unexplained_delta <= -REPORTABLE_LOSS_UNITS)
        {
            return Some(DriftKind::NonEvent);
        }

        None
    }

    fn window_evidence(stats: &WindowStats) -> serde_json::Value {
        serde_json::json!({
            "days": stats.days,
            "starting": stats.starting,
            "ending": stats.ending,
            "expected_ending": stats.expected_ending,
            "unexplained_delta": stats.unexplained_delta,
            "shrinkage_rate": stats.shrinkage_rate,
            "event_count": stats.event_count,
            "snapshot_count": stats.snapshot_count,
        })
    }
}

impl Detector for ShrinkageDriftDetector {
    fn name(&self) -> &'static str {
        "shrinkage_drift"
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
        // BTreeMap keeps SKU iteration deterministic.
        let mut by_sku: BTreeMap<&Sku, Vec<&InventorySnapshot>> = BTreeMap::new();
        for snap in &data.snapshots {
            by_sku.entry(&snap.sku).or_default().push(snap);
        }

        let mut results = Vec::new();

        for (sku, mut snapshots) in by_sku {
            if snapshots.len() < MIN_SNAPSHOTS {
                continue;
            }
            snapshots.sort_by_key(|s| s.snapshot_date);

            let [w7_days, w30_days, w90_days] = WINDOW_DAYS;
            let w7 = Self::window_stats(data, sku, &snapshots, w7_days);
            let w30 = match Self::window_stats(data, sku, &snapshots, w30_days) {
                Some(w) => w,
                None => continue,
            };
            let w90 = Self::window_stats(data, sku, &snapshots, w90_days);

            let kind = match Self::classify(w7.as_ref(), &w30, w90.as_ref()) {
                Some(kind) => kind,
                None => continue,
            };
            if w30.unexplained_delta >= 0 {
                continue;
            }

            let loss_units = w30.unexplained_delta.unsigned_abs() as i64;
            let (unit_value, priced_from_history) = data.estimate_unit_value(sku);
            let estimated_value = unit_value * Decimal::from_i64(loss_units);
            let projected_annual_loss =
                Decimal::from_f64_lossy(w30.daily_rate().abs() * 365.0) * unit_value;

            let windows_negative = [w7.as_ref(), Some(&w30), w90.as_ref()]
                .iter()
                .flatten()
                .filter(|w| w.unexplained_delta < 0)
                .count();

            let factors = ConfidenceFactors::new()
                .factor(
                    "continuous_snapshots",
                    0.30,
                    w30.snapshot_count >= CONTINUOUS_SNAPSHOT_COUNT,
                )
                .factor("multi_window_impact", 0.25, windows_negative >= 2)
                .factor("systematic_pattern", 0.20, kind == DriftKind::Systematic)
                .factor(
                    "high_unit_value",
                    0.15,
                    unit_value >= Decimal::from_i64(HIGH_UNIT_VALUE_USD),
                )
                .factor("corroborating_events", 0.10, w30.has_loss_events);

            let mut evidence = Evidence::new()
                .reason(format!(
                    "{} unexplained units lost over 30 days ({} drift)",
                    loss_units,
                    kind.as_str()
                ))
                .field("drift_kind", serde_json::json!(kind.as_str()))
                .field("unit_value", serde_json::json!(unit_value))
                .field(
                    "unit_value_from_price_history",
                    serde_json::json!(priced_from_history),
                )
                .field(
                    "projected_annual_loss",
                    serde_json::json!(projected_annual_loss),
                )
                .field("window_30d", Self::window_evidence(&w30))
                .field("confidence_factors", factors.evidence_value());
            if let Some(w7) = &w7 {
                evidence = evidence.field("window_7d", Self::window_evidence(w7));
            }
            if let Some(w90) = &w90 {
                evidence = evidence.field("window_90d", Self::window_evidence(w90));
            }

            let category = data
                .catalog
                .iter()
                .find(|e| &e.sku == sku)
                .and_then(|e| e.category.clone());
            let mut result = DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::InventoryShrinkage,
                estimated_value,
                crate::domain::Currency::usd(),
                factors.score(),
                evidence,
                vec![sku.0.clone()],
                data.as_of,
            )
            .with_claim_facts(crate::domain::ClaimFacts {
                sku: sku.clone(),
                quantity: loss_units,
                event_date: data.as_of,
                charged_fee: None,
                category,
                sale_price: None,
                currency: crate::domain::Currency::usd(),
            });
            if kind == DriftKind::Systematic {
                result = result.with_severity(
                    Severity::from_value(&estimated_value).promote(),
                );
            }
            results.push(result);
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}
