//! Phantom refund detection.
//!
//! A refund marked "return received" should be followed by a positive
//! customer-return inventory adjustment crediting the units back to stock.
//! When the credit never lands (or lands short), the missing units are a
//! recoverable loss. Results upsert per batch so reruns of one sync do not
//! accumulate duplicate trap records.

use super::{gate_and_rank, ConfidenceFactors, DetectionDataset, Detector, WriteMode};
use crate::domain::{
    AdjustmentKind, AnomalyType, Decimal, DetectionResult, Evidence, Refund, SellerId, SyncId,
};

/// Wait before judging: fulfillment centers get this long to post the
/// restock credit after a refund.
const CREDIT_GRACE_DAYS: i64 = 14;
/// Adjustment search window around the refund date.
const ADJUSTMENT_WINDOW_BEFORE_DAYS: i64 = 7;
const ADJUSTMENT_WINDOW_AFTER_DAYS: i64 = 45;
/// Past this age the credit is overwhelmingly unlikely to still arrive.
const AGED_BONUS_DAYS: i64 = 45;
const AGED_BONUS: f64 = 0.10;

const MIN_VALUE_USD: i64 = 15;
const SHOW_THRESHOLD: f64 = 0.60;

pub struct PhantomRefundDetector;

impl PhantomRefundDetector {
    /// Positive customer-return adjustments within the search window,
    /// matched first by order id and only then by SKU.
    fn matching_adjustments<'a>(
        data: &'a DetectionDataset,
        refund: &Refund,
    ) -> Vec<&'a crate::domain::InventoryAdjustment> {
        let window_start = refund
            .refund_date
            .minus_days(ADJUSTMENT_WINDOW_BEFORE_DAYS);
        let window_end = refund.refund_date.plus_days(ADJUSTMENT_WINDOW_AFTER_DAYS);

        let in_window = |a: &crate::domain::InventoryAdjustment| {
            a.kind == AdjustmentKind::CustomerReturn
                && a.quantity_delta > 0
                && a.adjustment_date >= window_start
                && a.adjustment_date <= window_end
        };

        let by_order: Vec<_> = data
            .adjustments
            .iter()
            .filter(|a| in_window(a))
            .filter(|a| a.order_id.as_ref() == Some(&refund.order_id))
            .collect();
        if !by_order.is_empty() {
            return by_order;
        }

        match &refund.sku {
            Some(sku) => data
                .adjustments
                .iter()
                .filter(|a| in_window(a))
                .filter(|a| &a.sku == sku)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Detector for PhantomRefundDetector {
    fn name(&self) -> &'static str {
        "phantom_refund"
    }

    fn min_value(&self) -> Decimal {
        Decimal::from_i64(MIN_VALUE_USD)
    }

    fn show_threshold(&self) -> f64 {
        SHOW_THRESHOLD
    }

    fn write_mode(&self) -> WriteMode {
        WriteMode::UpsertByBatch
    }

    fn detect(
        &self,
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
    ) -> Vec<DetectionResult> {
        let mut results = Vec::new();

        for refund in &data.refunds {
            let marked_received = refund
                .marked_return_status
                .map(|s| s.is_back_in_network())
                .unwrap_or(false);
            if !marked_received {
                continue;
            }

            let age_days = data.as_of.days_since(refund.refund_date);
            if age_days < CREDIT_GRACE_DAYS {
                continue;
            }

            let adjustments = Self::matching_adjustments(data, refund);
            let credited_quantity: i64 =
                adjustments.iter().map(|a| a.quantity_delta).sum();
            let phantom_quantity = refund.quantity - credited_quantity;
            if phantom_quantity <= 0 {
                continue;
            }

            let unit_value = refund.unit_value();
            let estimated_value = unit_value * Decimal::from_i64(phantom_quantity);

            let tracking_confirmed = data
                .returns_for_order(&refund.order_id, refund.sku.as_ref())
                .iter()
                .any(|r| r.tracking_confirmed);

            let factors = ConfidenceFactors::new()
                .factor("return_marked_received", 0.30, true)
                .factor("sufficient_wait", 0.25, age_days >= CREDIT_GRACE_DAYS)
                .factor("no_matching_adjustment", 0.25, credited_quantity == 0)
                .factor(
                    "clear_mismatch",
                    0.15,
                    phantom_quantity == refund.quantity,
                )
                .factor("tracking_confirmed", 0.05, tracking_confirmed)
                .bonus(AGED_BONUS, age_days > AGED_BONUS_DAYS);

            let mut related = vec![refund.refund_id.clone(), refund.order_id.0.clone()];
            related.extend(adjustments.iter().map(|a| a.adjustment_id.clone()));

            let evidence = Evidence::new()
                .reason(format!(
                    "refund {} marked return-received; {} of {} refunded units never credited back",
                    refund.refund_id, phantom_quantity, refund.quantity
                ))
                .field("refunded_quantity", serde_json::json!(refund.quantity))
                .field("credited_quantity", serde_json::json!(credited_quantity))
                .field("phantom_quantity", serde_json::json!(phantom_quantity))
                .field("unit_value", serde_json::json!(unit_value))
                .field("refund_age_days", serde_json::json!(age_days))
                .field("confidence_factors", factors.evidence_value());

            results.push(DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::PhantomRefund,
                estimated_value,
                refund.currency.clone(),
                factors.score(),
                evidence,
                related,
                data.as_of,
            ));
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}
