//! Dataset-wide return anomaly checks.
//!
//! Four near-deterministic signals run over the full dataset rather than
//! per event pair: returns received but never restocked, refunds exceeding
//! the original charge, canceled shipments still carrying fulfillment fees,
//! and inventory disposed of without seller consent. Confidence is flat per
//! check since each compares hard records.

use super::{gate_and_rank, DetectionDataset, Detector};
use crate::domain::{
    AdjustmentKind, AnomalyType, Currency, Decimal, DetectionResult, Evidence, SellerId,
    ShipmentStatus, SyncId,
};

/// Days allowed between a received return and its restock adjustment.
const RESTOCK_WINDOW_DAYS: i64 = 7;
/// Refunds above this multiple of the original charge are overcharges.
const REFUND_OVERCHARGE_RATIO: &str = "1.05";

const MISSING_RESTOCK_CONFIDENCE: f64 = 0.90;
const REFUND_OVERCHARGE_CONFIDENCE: f64 = 0.95;
const CANCELED_FEE_CONFIDENCE: f64 = 0.95;
const UNAUTHORIZED_DISPOSAL_CONFIDENCE: f64 = 0.85;

const MIN_VALUE_USD: i64 = 15;
const SHOW_THRESHOLD: f64 = 0.60;

pub struct ReturnAnomalyDetector;

impl Detector for ReturnAnomalyDetector {
    fn name(&self) -> &'static str {
        "return_anomalies"
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

        // Returns checked in but never credited back to sellable stock.
        for ret in &data.returns {
            if !ret.status.is_back_in_network() {
                continue;
            }
            // Only judge once the restock window has fully elapsed.
            if data.as_of.days_since(ret.return_date) < RESTOCK_WINDOW_DAYS {
                continue;
            }
            let window_end = ret.return_date.plus_days(RESTOCK_WINDOW_DAYS);
            let restocked = data.adjustments.iter().any(|a| {
                a.kind == AdjustmentKind::CustomerReturn
                    && a.quantity_delta > 0
                    && a.adjustment_date >= ret.return_date
                    && a.adjustment_date <= window_end
                    && (a.order_id.as_ref() == Some(&ret.order_id)
                        || ret.sku.as_ref() == Some(&a.sku))
            });
            if restocked {
                continue;
            }

            let sku = match &ret.sku {
                Some(sku) => sku.clone(),
                None => continue,
            };
            let (unit_value, _) = data.estimate_unit_value(&sku);
            let value = unit_value * Decimal::from_i64(ret.quantity);

            results.push(
                DetectionResult::new(
                    seller_id.clone(),
                    sync_id.clone(),
                    AnomalyType::MissingRestock,
                    value,
                    Currency::usd(),
                    MISSING_RESTOCK_CONFIDENCE,
                    Evidence::new()
                        .reason(format!(
                            "return {} received but no restock adjustment within {} days",
                            ret.return_id, RESTOCK_WINDOW_DAYS
                        ))
                        .field("quantity", serde_json::json!(ret.quantity))
                        .field("unit_value", serde_json::json!(unit_value)),
                    vec![ret.return_id.clone(), ret.order_id.0.clone()],
                    data.as_of,
                )
                .with_claim_facts(crate::domain::ClaimFacts {
                    sku: sku.clone(),
                    quantity: ret.quantity,
                    event_date: ret.return_date,
                    charged_fee: None,
                    category: None,
                    sale_price: None,
                    currency: Currency::usd(),
                }),
            );
        }

        // Refunds exceeding the original charge.
        let overcharge_ratio =
            Decimal::parse(REFUND_OVERCHARGE_RATIO).unwrap_or(Decimal::ONE);
        for refund in &data.refunds {
            let order = match data.find_order(&refund.order_id, refund.sku.as_ref()) {
                Some(order) => order,
                None => continue,
            };
            let charged = order.sale_amount();
            if !charged.is_positive() {
                continue;
            }
            if refund.amount > charged * overcharge_ratio {
                let excess = refund.amount - charged;
                results.push(DetectionResult::new(
                    seller_id.clone(),
                    sync_id.clone(),
                    AnomalyType::RefundOvercharge,
                    excess,
                    refund.currency.clone(),
                    REFUND_OVERCHARGE_CONFIDENCE,
                    Evidence::new()
                        .reason(format!(
                            "refund {} of {} exceeds original charge {}",
                            refund.refund_id, refund.amount, charged
                        ))
                        .field("refund_amount", serde_json::json!(refund.amount))
                        .field("original_charge", serde_json::json!(charged)),
                    vec![refund.refund_id.clone(), refund.order_id.0.clone()],
                    data.as_of,
                ));
            }
        }

        // Canceled shipments that kept their fulfillment fee.
        for shipment in &data.shipments {
            if shipment.status != ShipmentStatus::Canceled {
                continue;
            }
            if !shipment.fulfillment_fee.is_positive() {
                continue;
            }
            results.push(DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::CanceledShipmentFee,
                shipment.fulfillment_fee,
                shipment.currency.clone(),
                CANCELED_FEE_CONFIDENCE,
                Evidence::new()
                    .reason(format!(
                        "shipment {} canceled but fulfillment fee {} retained",
                        shipment.shipment_id, shipment.fulfillment_fee
                    ))
                    .field(
                        "fulfillment_fee",
                        serde_json::json!(shipment.fulfillment_fee),
                    ),
                vec![shipment.shipment_id.clone(), shipment.order_id.0.clone()],
                data.as_of,
            ));
        }

        // Inventory destroyed or disposed without seller consent.
        for adj in &data.adjustments {
            if adj.kind != AdjustmentKind::Disposed || adj.seller_authorized {
                continue;
            }
            let units = adj.quantity_delta.unsigned_abs() as i64;
            if units == 0 {
                continue;
            }
            let (unit_value, _) = data.estimate_unit_value(&adj.sku);
            results.push(
                DetectionResult::new(
                    seller_id.clone(),
                    sync_id.clone(),
                    AnomalyType::UnauthorizedDisposal,
                    unit_value * Decimal::from_i64(units),
                    Currency::usd(),
                    UNAUTHORIZED_DISPOSAL_CONFIDENCE,
                    Evidence::new()
                        .reason(format!(
                            "{} units of {} disposed without seller authorization",
                            units, adj.sku
                        ))
                        .field("quantity", serde_json::json!(units))
                        .field("unit_value", serde_json::json!(unit_value)),
                    vec![adj.adjustment_id.clone(), adj.sku.0.clone()],
                    data.as_of,
                )
                .with_claim_facts(crate::domain::ClaimFacts {
                    sku: adj.sku.clone(),
                    quantity: units,
                    event_date: adj.adjustment_date,
                    charged_fee: None,
                    category: None,
                    sale_price: None,
                    currency: Currency::usd(),
                }),
            );
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InventoryAdjustment, ItemCondition, Order, OrderId, Refund, ReturnRecord, ReturnStatus,
        Shipment, Sku, TimeMs,
    };

    fn as_of() -> TimeMs {
        TimeMs::new(1_750_000_000_000)
    }

    fn detect(data: &DetectionDataset) -> Vec<DetectionResult> {
        ReturnAnomalyDetector.detect(&SellerId::new("S1"), &SyncId::new("sync"), data)
    }

    fn received_return(id: &str, age_days: i64) -> ReturnRecord {
        ReturnRecord {
            return_id: id.to_string(),
            order_id: OrderId::new("ORD-1"),
            sku: Some(Sku::new("SKU-1")),
            return_date: as_of().minus_days(age_days),
            quantity: 2,
            status: ReturnStatus::Received,
            condition: ItemCondition::Sellable,
            tracking_confirmed: true,
        }
    }

    #[test]
    fn test_missing_restock_detected() {
        let data = DetectionDataset {
            as_of: as_of(),
            returns: vec![received_return("RET-1", 15)],
            ..Default::default()
        };
        let results = detect(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].anomaly_type, AnomalyType::MissingRestock);
        // 2 units x $20 default.
        assert_eq!(results[0].estimated_value, Decimal::parse("40").unwrap());
        assert_eq!(results[0].confidence, 0.90);
    }

    #[test]
    fn test_restocked_return_not_flagged() {
        let data = DetectionDataset {
            as_of: as_of(),
            returns: vec![received_return("RET-1", 15)],
            adjustments: vec![InventoryAdjustment {
                adjustment_id: "ADJ-1".into(),
                sku: Sku::new("SKU-1"),
                order_id: Some(OrderId::new("ORD-1")),
                adjustment_date: as_of().minus_days(12),
                quantity_delta: 2,
                kind: AdjustmentKind::CustomerReturn,
                seller_authorized: true,
                reason: None,
            }],
            ..Default::default()
        };
        assert!(detect(&data).is_empty());
    }

    #[test]
    fn test_return_inside_restock_window_not_judged() {
        let data = DetectionDataset {
            as_of: as_of(),
            returns: vec![received_return("RET-1", 3)],
            ..Default::default()
        };
        assert!(detect(&data).is_empty());
    }

    #[test]
    fn test_refund_overcharge() {
        let order = Order {
            order_id: OrderId::new("ORD-1"),
            seller_id: SellerId::new("S1"),
            sku: Sku::new("SKU-1"),
            buyer_id: None,
            order_date: as_of().minus_days(40),
            quantity_ordered: 1,
            quantity_shipped: 1,
            unit_price: Decimal::parse("50").unwrap(),
            listed_price: Decimal::parse("50").unwrap(),
            charged_fee: Decimal::ZERO,
            expected_fee: None,
            net_proceeds: None,
            category: None,
            currency: Currency::usd(),
        };
        let refund = Refund {
            refund_id: "R-1".into(),
            order_id: OrderId::new("ORD-1"),
            sku: Some(Sku::new("SKU-1")),
            buyer_id: None,
            refund_date: as_of().minus_days(10),
            quantity: 1,
            amount: Decimal::parse("70").unwrap(),
            currency: Currency::usd(),
            marked_return_status: None,
            restocking_fee_applied: Decimal::ZERO,
        };
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order],
            refunds: vec![refund],
            ..Default::default()
        };
        let results = detect(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].anomaly_type, AnomalyType::RefundOvercharge);
        assert_eq!(results[0].estimated_value, Decimal::parse("20").unwrap());
    }

    #[test]
    fn test_refund_within_tolerance_not_flagged() {
        let order = Order {
            order_id: OrderId::new("ORD-1"),
            seller_id: SellerId::new("S1"),
            sku: Sku::new("SKU-1"),
            buyer_id: None,
            order_date: as_of().minus_days(40),
            quantity_ordered: 1,
            quantity_shipped: 1,
            unit_price: Decimal::parse("50").unwrap(),
            listed_price: Decimal::parse("50").unwrap(),
            charged_fee: Decimal::ZERO,
            expected_fee: None,
            net_proceeds: None,
            category: None,
            currency: Currency::usd(),
        };
        let refund = Refund {
            refund_id: "R-1".into(),
            order_id: OrderId::new("ORD-1"),
            sku: Some(Sku::new("SKU-1")),
            buyer_id: None,
            refund_date: as_of().minus_days(10),
            quantity: 1,
            // 4% over: inside the 5% tolerance.
            amount: Decimal::parse("52").unwrap(),
            currency: Currency::usd(),
            marked_return_status: None,
            restocking_fee_applied: Decimal::ZERO,
        };
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order],
            refunds: vec![refund],
            ..Default::default()
        };
        assert!(detect(&data).is_empty());
    }

    #[test]
    fn test_canceled_shipment_fee() {
        let data = DetectionDataset {
            as_of: as_of(),
            shipments: vec![Shipment {
                shipment_id: "SHIP-1".into(),
                order_id: OrderId::new("ORD-1"),
                sku: None,
                ship_date: as_of().minus_days(20),
                quantity: 1,
                status: ShipmentStatus::Canceled,
                fulfillment_fee: Decimal::parse("18.50").unwrap(),
                currency: Currency::usd(),
                carrier_delay_days: 0,
            }],
            ..Default::default()
        };
        let results = detect(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].anomaly_type, AnomalyType::CanceledShipmentFee);
        assert_eq!(
            results[0].estimated_value,
            Decimal::parse("18.50").unwrap()
        );
    }

    #[test]
    fn test_unauthorized_disposal() {
        let data = DetectionDataset {
            as_of: as_of(),
            adjustments: vec![InventoryAdjustment {
                adjustment_id: "ADJ-1".into(),
                sku: Sku::new("SKU-1"),
                order_id: None,
                adjustment_date: as_of().minus_days(5),
                quantity_delta: -3,
                kind: AdjustmentKind::Disposed,
                seller_authorized: false,
                reason: None,
            }],
            ..Default::default()
        };
        let results = detect(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].anomaly_type, AnomalyType::UnauthorizedDisposal);
        // 3 units x $20 default.
        assert_eq!(results[0].estimated_value, Decimal::parse("60").unwrap());
    }

    #[test]
    fn test_authorized_disposal_not_flagged() {
        let data = DetectionDataset {
            as_of: as_of(),
            adjustments: vec![InventoryAdjustment {
                adjustment_id: "ADJ-1".into(),
                sku: Sku::new("SKU-1"),
                order_id: None,
                adjustment_date: as_of().minus_days(5),
                quantity_delta: -3,
                kind: AdjustmentKind::Disposed,
                seller_authorized: true,
                reason: None,
            }],
            ..Default::default()
        };
        assert!(detect(&data).is_empty());
    }
}
