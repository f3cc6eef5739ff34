//! Anomaly detectors and the shared detection contract.
//!
//! Each detector is a pure function of its inputs: same dataset, same
//! seller/sync ids, same `as_of` reference time, same results (up to
//! ordering). The registry gives the orchestration layer a uniform view so
//! detectors can run in parallel and be unit tested in isolation.

use crate::domain::{
    CatalogEntry, ClaimRecord, Decimal, DetectionResult, InventoryAdjustment, InventorySnapshot,
    InvoiceLineItem, ListingPerformance, Order, OrderId, Refund, Reimbursement, RemovalEvent,
    ReturnRecord, SellerId, Shipment, Sku, SyncId, TimeMs,
};

pub mod claim_gaps;
pub mod confidence;
pub mod order_discrepancy;
pub mod phantom_refund;
pub mod refund_no_return;
pub mod return_abuse;
pub mod return_anomalies;
pub mod shrinkage;
pub mod suppression;

pub use confidence::{ConfidenceFactor, ConfidenceFactors};

/// Fallback per-unit value when no price history exists for a SKU.
pub const DEFAULT_UNIT_VALUE_USD: i64 = 20;

/// How a detector's results are written to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain batch insert; duplicate suppression is the sink's concern.
    BatchInsert,
    /// Upsert keyed on (seller_id, sync_id, anomaly_type) so reruns of the
    /// same batch do not accumulate duplicate trap records.
    UpsertByBatch,
}

/// All event collections for one seller, pre-filtered to the lookback
/// window by the caller, plus the run's reference time.
#[derive(Debug, Clone, Default)]
pub struct DetectionDataset {
    /// Reference "now" for all age and window arithmetic.
    pub as_of: TimeMs,
    pub orders: Vec<Order>,
    pub returns: Vec<ReturnRecord>,
    pub refunds: Vec<Refund>,
    pub reimbursements: Vec<Reimbursement>,
    pub snapshots: Vec<InventorySnapshot>,
    pub adjustments: Vec<InventoryAdjustment>,
    pub shipments: Vec<Shipment>,
    pub removals: Vec<RemovalEvent>,
    pub claims: Vec<ClaimRecord>,
    pub listings: Vec<ListingPerformance>,
    pub catalog: Vec<CatalogEntry>,
    pub invoices: Vec<InvoiceLineItem>,
}

impl DetectionDataset {
    /// First order line matching the given order id (and SKU when provided).
    pub fn find_order(&self, order_id: &OrderId, sku: Option<&Sku>) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| &o.order_id == order_id && sku.map(|s| &o.sku == s).unwrap_or(true))
    }

    /// Returns recorded against the given order id (SKU-refined when known).
    pub fn returns_for_order(&self, order_id: &OrderId, sku: Option<&Sku>) -> Vec<&ReturnRecord> {
        self.returns
            .iter()
            .filter(|r| {
                &r.order_id == order_id
                    && match (sku, &r.sku) {
                        (Some(want), Some(have)) => want == have,
                        _ => true,
                    }
            })
            .collect()
    }

    /// Reimbursements recorded against the given order id.
    pub fn reimbursements_for_order(
        &self,
        order_id: &OrderId,
        sku: Option<&Sku>,
    ) -> Vec<&Reimbursement> {
        self.reimbursements
            .iter()
            .filter(|r| {
                r.order_id.as_ref() == Some(order_id)
                    && match (sku, &r.sku) {
                        (Some(want), Some(have)) => want == have,
                        _ => true,
                    }
            })
            .collect()
    }

    /// Most recent charged unit price for a SKU, from order history.
    pub fn latest_unit_price(&self, sku: &Sku) -> Option<Decimal> {
        self.orders
            .iter()
            .filter(|o| &o.sku == sku)
            .max_by_key(|o| o.order_date)
            .map(|o| o.unit_price)
    }

    /// Per-unit value estimate for a SKU: recent price history, falling back
    /// to the flat default.
    pub fn estimate_unit_value(&self, sku: &Sku) -> (Decimal, bool) {
        match self.latest_unit_price(sku) {
            Some(price) if price.is_positive() => (price, true),
            _ => (Decimal::from_i64(DEFAULT_UNIT_VALUE_USD), false),
        }
    }
}

/// A single anomaly detector.
///
/// Implementations must be stateless: everything they need arrives in the
/// dataset, and nothing is carried across calls.
pub trait Detector: Send + Sync {
    /// Short module-style name for logging and run summaries.
    fn name(&self) -> &'static str;

    /// Minimum estimated value for a result to be emitted.
    fn min_value(&self) -> Decimal;

    /// Minimum raw confidence for a result to be emitted.
    fn show_threshold(&self) -> f64;

    fn write_mode(&self) -> WriteMode {
        WriteMode::BatchInsert
    }

    fn detect(
        &self,
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
    ) -> Vec<DetectionResult>;
}

/// Apply the two emission gates and sort by financial impact descending.
///
/// Sub-threshold candidates are silently dropped, not stored with a
/// low-confidence flag. The detection key breaks value ties so output order
/// is deterministic.
pub fn gate_and_rank(
    mut results: Vec<DetectionResult>,
    min_value: Decimal,
    show_threshold: f64,
) -> Vec<DetectionResult> {
    results.retain(|r| r.passes_gates(min_value, show_threshold));
    results.sort_by(|a, b| {
        b.estimated_value
            .cmp(&a.estimated_value)
            .then_with(|| a.detection_key.cmp(&b.detection_key))
    });
    results
}

/// The full detector registry, one entry per algorithm.
pub fn registry() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(refund_no_return::RefundWithoutReturnDetector),
        Box::new(phantom_refund::PhantomRefundDetector),
        Box::new(return_abuse::ReturnAbuseDetector),
        Box::new(shrinkage::ShrinkageDriftDetector),
        Box::new(order_discrepancy::OrderDiscrepancyDetector),
        Box::new(claim_gaps::ClaimWorkflowGapDetector),
        Box::new(return_anomalies::ReturnAnomalyDetector),
        Box::new(suppression::SilentSuppressionDetector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnomalyType, Currency, Evidence};

    fn result(value: &str, confidence: f64, tag: &str) -> DetectionResult {
        DetectionResult::new(
            SellerId::new("S1"),
            SyncId::new("sync"),
            AnomalyType::RefundNoReturn,
            Decimal::parse(value).unwrap(),
            Currency::usd(),
            confidence,
            Evidence::new(),
            vec![tag.to_string()],
            TimeMs::new(0),
        )
    }

    #[test]
    fn test_gate_and_rank_drops_subthreshold() {
        let results = vec![
            result("50", 0.9, "a"),
            result("5", 0.9, "b"),   // below min value
            result("50", 0.4, "c"),  // below show threshold
        ];
        let kept = gate_and_rank(results, Decimal::from_i64(10), 0.60);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].related_event_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_gate_and_rank_sorts_by_value_desc() {
        let results = vec![
            result("20", 0.9, "small"),
            result("200", 0.9, "big"),
            result("75", 0.9, "mid"),
        ];
        let kept = gate_and_rank(results, Decimal::from_i64(10), 0.60);
        let values: Vec<String> = kept
            .iter()
            .map(|r| r.estimated_value.to_canonical_string())
            .collect();
        assert_eq!(values, vec!["200", "75", "20"]);
    }

    #[test]
    fn test_registry_has_all_eight_detectors() {
        let names: Vec<&str> = registry().iter().map(|d| d.name()).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"refund_without_return"));
        assert!(names.contains(&"silent_suppression"));
    }

    #[test]
    fn test_registry_thresholds_within_contract_ranges() {
        for detector in registry() {
            let min = detector.min_value();
            assert!(
                min >= Decimal::from_i64(10) && min <= Decimal::from_i64(25),
                "{} min value {} outside $10-$25",
                detector.name(),
                min
            );
            let show = detector.show_threshold();
            assert!(
                (0.55..=0.60).contains(&show),
                "{} show threshold {} outside 0.55-0.60",
                detector.name(),
                show
            );
        }
    }

    #[test]
    fn test_estimate_unit_value_default() {
        let data = DetectionDataset::default();
        let (value, from_history) = data.estimate_unit_value(&Sku::new("SKU-X"));
        assert_eq!(value, Decimal::from_i64(DEFAULT_UNIT_VALUE_USD));
        assert!(!from_history);
    }
}
