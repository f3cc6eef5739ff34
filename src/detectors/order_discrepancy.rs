//! Order-level discrepancy detection.
//!
//! Four independent per-line checks: short shipments, charged-vs-listed
//! price gaps, fee overcharges against the published schedule, and net
//! proceeds that fail recomputation. One order line can emit several
//! results.

use super::{gate_and_rank, DetectionDataset, Detector};
use crate::domain::{
    AnomalyType, Decimal, DetectionResult, Evidence, Order, SellerId, SyncId,
};

/// Price gaps below $1 are rounding noise.
const PRICE_MISMATCH_MIN_USD: i64 = 1;
/// Fee overcharges below 50 cents are not worth disputing.
const FEE_OVERCHARGE_MIN: &str = "0.50";
/// Net-proceeds recomputation errors below $1 are rounding noise.
const PROCEEDS_MISMATCH_MIN_USD: i64 = 1;

/// All four checks are near-mechanical comparisons of reported numbers.
const FIXED_CONFIDENCE: f64 = 0.75;

const MIN_VALUE_USD: i64 = 10;
const SHOW_THRESHOLD: f64 = 0.60;

pub struct OrderDiscrepancyDetector;

impl OrderDiscrepancyDetector {
    fn emit(
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
        order: &Order,
        anomaly_type: AnomalyType,
        value: Decimal,
        evidence: Evidence,
    ) -> DetectionResult {
        DetectionResult::new(
            seller_id.clone(),
            sync_id.clone(),
            anomaly_type,
            value,
            order.currency.clone(),
            FIXED_CONFIDENCE,
            evidence,
            vec![order.order_id.0.clone(), order.sku.0.clone()],
            data.as_of,
        )
    }
}

impl Detector for OrderDiscrepancyDetector {
    fn name(&self) -> &'static str {
        "order_discrepancy"
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

        for order in &data.orders {
            // Short shipment: fewer units shipped than ordered and paid for.
            if order.quantity_shipped < order.quantity_ordered {
                let missing = order.quantity_ordered - order.quantity_shipped;
                let value = order.unit_price * Decimal::from_i64(missing);
                results.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    order,
                    AnomalyType::QuantityMismatch,
                    value,
                    Evidence::new()
                        .reason(format!(
                            "order {} shipped {} of {} units",
                            order.order_id, order.quantity_shipped, order.quantity_ordered
                        ))
                        .field("quantity_ordered", serde_json::json!(order.quantity_ordered))
                        .field("quantity_shipped", serde_json::json!(order.quantity_shipped))
                        .field("unit_price", serde_json::json!(order.unit_price)),
                ));
            }

            // Charged price under the listed price.
            let price_gap = order.listed_price - order.unit_price;
            if price_gap >= Decimal::from_i64(PRICE_MISMATCH_MIN_USD) {
                let value = price_gap * Decimal::from_i64(order.quantity_ordered);
                results.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    order,
                    AnomalyType::PriceMismatch,
                    value,
                    Evidence::new()
                        .reason(format!(
                            "order {} charged {} against listed price {}",
                            order.order_id, order.unit_price, order.listed_price
                        ))
                        .field("listed_price", serde_json::json!(order.listed_price))
                        .field("charged_price", serde_json::json!(order.unit_price)),
                ));
            }

            // Fee charged above the expected schedule amount.
            if let Some(expected_fee) = order.expected_fee {
                let overcharge = order.charged_fee - expected_fee;
                if overcharge >= Decimal::parse(FEE_OVERCHARGE_MIN).unwrap_or(Decimal::ZERO) {
                    results.push(Self::emit(
                        seller_id,
                        sync_id,
                        data,
                        order,
                        AnomalyType::FeeOvercharge,
                        overcharge,
                        Evidence::new()
                            .reason(format!(
                                "order {} fee {} exceeds expected {}",
                                order.order_id, order.charged_fee, expected_fee
                            ))
                            .field("charged_fee", serde_json::json!(order.charged_fee))
                            .field("expected_fee", serde_json::json!(expected_fee)),
                    ));
                }
            }

            // Reported net proceeds below what the line recomputes to.
            if let Some(net_proceeds) = order.net_proceeds {
                let shortfall = order.expected_proceeds() - net_proceeds;
                if shortfall >= Decimal::from_i64(PROCEEDS_MISMATCH_MIN_USD) {
                    results.push(Self::emit(
                        seller_id,
                        sync_id,
                        data,
                        order,
                        AnomalyType::ProceedsMismatch,
                        shortfall,
                        Evidence::new()
                            .reason(format!(
                                "order {} proceeds {} short of recomputed {}",
                                order.order_id,
                                net_proceeds,
                                order.expected_proceeds()
                            ))
                            .field("reported_proceeds", serde_json::json!(net_proceeds))
                            .field(
                                "recomputed_proceeds",
                                serde_json::json!(order.expected_proceeds()),
                            ),
                    ));
                }
            }
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}
