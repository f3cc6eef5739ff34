//! Refund-without-return detection.
//!
//! A refund older than the marketplace return window with no matching
//! customer return and no reimbursement means the buyer kept both the money
//! and the item; the full refund amount is recoverable.

use super::{gate_and_rank, DetectionDataset, Detector};
use crate::domain::{
    AnomalyType, DetectionResult, Decimal, Evidence, SellerId, SyncId,
};

/// Marketplace return window: refunds younger than this may still see the
/// item come back.
const RETURN_WINDOW_DAYS: i64 = 45;
/// Age past which a missing return is near-certain.
const HIGH_CONFIDENCE_AGE_DAYS: i64 = 60;
/// Refunds below this are ignored outright.
const MIN_REFUND_USD: i64 = 3;
/// Filing window for this claim class, measured from the refund date.
const FILING_DEADLINE_DAYS: i64 = 540;

const MIN_VALUE_USD: i64 = 10;
const SHOW_THRESHOLD: f64 = 0.60;

const CONFIDENCE_AGED: f64 = 0.95;
const CONFIDENCE_RECENT: f64 = 0.75;

pub struct RefundWithoutReturnDetector;

impl Detector for RefundWithoutReturnDetector {
    fn name(&self) -> &'static str {
        "refund_without_return"
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

        for refund in &data.refunds {
            let age_days = data.as_of.days_since(refund.refund_date);
            if age_days < RETURN_WINDOW_DAYS {
                continue;
            }
            if refund.amount < Decimal::from_i64(MIN_REFUND_USD) {
                continue;
            }

            let sku = refund.sku.as_ref();
            let returns = data.returns_for_order(&refund.order_id, sku);
            let reimbursements = data.reimbursements_for_order(&refund.order_id, sku);
            if !returns.is_empty() || !reimbursements.is_empty() {
                continue;
            }

            let confidence = if age_days > HIGH_CONFIDENCE_AGE_DAYS {
                CONFIDENCE_AGED
            } else {
                CONFIDENCE_RECENT
            };

            let mut related = vec![refund.refund_id.clone(), refund.order_id.0.clone()];
            if let Some(sku) = sku {
                related.push(sku.0.clone());
            }

            let evidence = Evidence::new()
                .reason(format!(
                    "refund {} issued {} days ago with no matching return or reimbursement",
                    refund.refund_id, age_days
                ))
                .field("refund_amount", serde_json::json!(refund.amount))
                .field("refund_age_days", serde_json::json!(age_days))
                .field(
                    "return_window_days",
                    serde_json::json!(RETURN_WINDOW_DAYS),
                );

            let result = DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::RefundNoReturn,
                refund.amount,
                refund.currency.clone(),
                confidence,
                evidence,
                related,
                data.as_of,
            )
            .with_deadline(
                refund.refund_date.plus_days(FILING_DEADLINE_DAYS),
                data.as_of,
            );

            results.push(result);
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}
