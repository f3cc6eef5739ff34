//! Return abuse detection.
//!
//! Six sub-checks per refund/return pair plus a buyer-level serial-returner
//! sweep. Each sub-check recovers a different slice of refund leakage:
//! items never sent back, wrong or damaged items fully refunded, returns
//! accepted outside the window, short-quantity returns, and restocking fees
//! that were never (or only partially) withheld.

use super::{gate_and_rank, ConfidenceFactors, DetectionDataset, Detector};
use crate::domain::{
    AnomalyType, BuyerId, Decimal, DetectionResult, Evidence, ItemCondition, Refund, ReturnRecord,
    SellerId, Severity, SyncId,
};
use std::collections::{BTreeMap, HashSet};

/// Grace period before a missing return counts as kept merchandise.
/// Intentionally separate from the 30-day late-return window below; the two
/// derive from different marketplace policy clauses.
const NO_RETURN_GRACE_DAYS: i64 = 45;
/// Returns accepted later than this many days after the order are late.
const LATE_RETURN_WINDOW_DAYS: i64 = 30;

/// Buyer return-rate tiers.
const SERIAL_RATE_MEDIUM: f64 = 0.30;
const SERIAL_RATE_EXTREME: f64 = 0.50;
/// Minimum orders before a buyer's return rate is meaningful.
const SERIAL_MIN_ORDERS: usize = 4;
/// Share of the refunds claimed back as a deterrence signal.
const SERIAL_RECOVERY_RATE: &str = "0.5";

const MIN_VALUE_USD: i64 = 10;
const SHOW_THRESHOLD: f64 = 0.55;

/// Restocking-fee rate by product category; wrong-item returns recover 100%.
fn restocking_rate(category: Option<&str>) -> Decimal {
    let rate = match category.map(|c| c.to_ascii_lowercase()) {
        Some(c) if c.contains("apparel") || c.contains("clothing") || c.contains("shoes") => "0.20",
        Some(c) if c.contains("book") || c.contains("media") || c.contains("music") => "0.10",
        _ => "0.15",
    };
    Decimal::parse(rate).unwrap_or(Decimal::ZERO)
}

pub struct ReturnAbuseDetector;

struct RefundContext<'a> {
    refund: &'a Refund,
    paired_return: Option<&'a ReturnRecord>,
    category: Option<String>,
    order_date: Option<crate::domain::TimeMs>,
}

impl ReturnAbuseDetector {
    fn context<'a>(data: &'a DetectionDataset, refund: &'a Refund) -> RefundContext<'a> {
        let order = data.find_order(&refund.order_id, refund.sku.as_ref());
        let paired_return = data
            .returns_for_order(&refund.order_id, refund.sku.as_ref())
            .into_iter()
            .min_by_key(|r| r.return_date);
        RefundContext {
            refund,
            paired_return,
            category: order.and_then(|o| o.category.clone()),
            order_date: order.map(|o| o.order_date),
        }
    }

    fn pair_confidence(ctx: &RefundContext<'_>) -> ConfidenceFactors {
        ConfidenceFactors::new()
            .factor(
                "clear_refund_record",
                0.30,
                ctx.refund.amount.is_positive() && ctx.refund.quantity > 0,
            )
            .factor(
                "return_status_clear",
                0.25,
                ctx.paired_return.is_some() || ctx.refund.marked_return_status.is_some(),
            )
            .factor("window_verifiable", 0.25, ctx.order_date.is_some())
            .factor(
                "condition_documented",
                0.15,
                ctx.paired_return
                    .map(|r| r.condition != ItemCondition::Unknown)
                    .unwrap_or(false),
            )
            .factor(
                "buyer_pattern_known",
                0.05,
                ctx.refund.buyer_id.is_some(),
            )
    }

    fn emit(
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
        ctx: &RefundContext<'_>,
        anomaly_type: AnomalyType,
        value: Decimal,
        reason: String,
    ) -> DetectionResult {
        let factors = Self::pair_confidence(ctx);
        let mut related = vec![
            ctx.refund.refund_id.clone(),
            ctx.refund.order_id.0.clone(),
        ];
        if let Some(ret) = ctx.paired_return {
            related.push(ret.return_id.clone());
        }

        let evidence = Evidence::new()
            .reason(reason)
            .field("refund_amount", serde_json::json!(ctx.refund.amount))
            .field(
                "refund_quantity",
                serde_json::json!(ctx.refund.quantity),
            )
            .field("confidence_factors", factors.evidence_value());

        DetectionResult::new(
            seller_id.clone(),
            sync_id.clone(),
            anomaly_type,
            value,
            ctx.refund.currency.clone(),
            factors.score(),
            evidence,
            related,
            data.as_of,
        )
    }

    fn check_pair(
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
        ctx: &RefundContext<'_>,
        out: &mut Vec<DetectionResult>,
    ) {
        let refund = ctx.refund;
        let rate = restocking_rate(ctx.category.as_deref());

        // No return after the grace period: the buyer kept the item.
        if ctx.paired_return.is_none() {
            let age = data.as_of.days_since(refund.refund_date);
            if age > NO_RETURN_GRACE_DAYS {
                out.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    ctx,
                    AnomalyType::ReturnNotReceived,
                    refund.amount,
                    format!(
                        "refund {} has no return record {} days after issue",
                        refund.refund_id, age
                    ),
                ));
            }
            return;
        }
        let ret = ctx.paired_return.expect("checked above");

        // Wrong item sent back: the full refund is recoverable.
        if ret.condition == ItemCondition::WrongItem {
            out.push(Self::emit(
                seller_id,
                sync_id,
                data,
                ctx,
                AnomalyType::WrongItemReturn,
                refund.amount,
                format!(
                    "return {} graded wrong-item; full refund recoverable",
                    ret.return_id
                ),
            ));
        }

        // Customer-damaged item refunded in full.
        if ret.condition == ItemCondition::CustomerDamaged
            && refund.restocking_fee_applied.is_zero()
        {
            out.push(Self::emit(
                seller_id,
                sync_id,
                data,
                ctx,
                AnomalyType::DamagedReturnFullRefund,
                refund.amount * rate,
                format!(
                    "return {} customer-damaged but refunded in full; restocking rate {}",
                    ret.return_id, rate
                ),
            ));
        }

        // Return accepted outside the return window.
        if let Some(order_date) = ctx.order_date {
            let days_to_return = ret.return_date.days_since(order_date);
            if days_to_return > LATE_RETURN_WINDOW_DAYS {
                out.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    ctx,
                    AnomalyType::LateReturn,
                    refund.amount * rate,
                    format!(
                        "return {} accepted {} days after order (window {} days)",
                        ret.return_id, days_to_return, LATE_RETURN_WINDOW_DAYS
                    ),
                ));
            }
        }

        // Fewer units came back than were refunded.
        if ret.quantity < refund.quantity {
            let missing = refund.quantity - ret.quantity;
            out.push(Self::emit(
                seller_id,
                sync_id,
                data,
                ctx,
                AnomalyType::PartialReturn,
                refund.unit_value() * Decimal::from_i64(missing),
                format!(
                    "return {} short {} of {} refunded units",
                    ret.return_id, missing, refund.quantity
                ),
            ));
        }

        // Restocking fee withheld short of the category rate.
        if ret.condition == ItemCondition::CustomerDamaged {
            let expected_fee = refund.amount * rate;
            let applied = refund.restocking_fee_applied;
            if applied.is_positive() && applied < expected_fee {
                out.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    ctx,
                    AnomalyType::MissingRestockingFee,
                    expected_fee - applied,
                    format!(
                        "restocking fee on refund {} under-withheld ({} of {})",
                        refund.refund_id, applied, expected_fee
                    ),
                ));
            }
        }
    }

    fn check_serial_returners(
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
        out: &mut Vec<DetectionResult>,
    ) {
        // BTreeMap keeps buyer iteration deterministic.
        let mut refunds_by_buyer: BTreeMap<&BuyerId, Vec<&Refund>> = BTreeMap::new();
        for refund in &data.refunds {
            if let Some(buyer) = &refund.buyer_id {
                refunds_by_buyer.entry(buyer).or_default().push(refund);
            }
        }

        for (buyer, refunds) in refunds_by_buyer {
            let order_ids: HashSet<_> = data
                .orders
                .iter()
                .filter(|o| o.buyer_id.as_ref() == Some(buyer))
                .map(|o| &o.order_id)
                .collect();
            if order_ids.len() < SERIAL_MIN_ORDERS {
                continue;
            }

            let refunded_orders: HashSet<_> =
                refunds.iter().map(|r| &r.order_id).collect();
            let return_rate = refunded_orders.len() as f64 / order_ids.len() as f64;
            if return_rate < SERIAL_RATE_MEDIUM {
                continue;
            }
            let extreme = return_rate >= SERIAL_RATE_EXTREME;

            let total_refunded: Decimal = refunds.iter().map(|r| r.amount).sum();
            let recovery_rate = Decimal::parse(SERIAL_RECOVERY_RATE).unwrap_or(Decimal::ZERO);
            let value = total_refunded * recovery_rate;

            let matched_returns = refunds.iter().filter(|r| {
                !data
                    .returns_for_order(&r.order_id, r.sku.as_ref())
                    .is_empty()
            });
            let factors = ConfidenceFactors::new()
                .factor("clear_refund_record", 0.30, true)
                .factor(
                    "return_status_clear",
                    0.25,
                    matched_returns.count() * 2 >= refunds.len(),
                )
                .factor("window_verifiable", 0.25, true)
                .factor("condition_documented", 0.15, extreme)
                .factor("buyer_pattern_known", 0.05, true);

            let currency = refunds[0].currency.clone();
            let mut related: Vec<String> =
                refunds.iter().map(|r| r.refund_id.clone()).collect();
            related.push(buyer.0.clone());

            let evidence = Evidence::new()
                .reason(format!(
                    "buyer refunded {} of {} orders ({:.0}% return rate)",
                    refunded_orders.len(),
                    order_ids.len(),
                    return_rate * 100.0
                ))
                .field("return_rate", serde_json::json!(return_rate))
                .field("orders", serde_json::json!(order_ids.len()))
                .field("refunded_orders", serde_json::json!(refunded_orders.len()))
                .field("total_refunded", serde_json::json!(total_refunded))
                .field("confidence_factors", factors.evidence_value());

            let mut result = DetectionResult::new(
                seller_id.clone(),
                sync_id.clone(),
                AnomalyType::SerialReturner,
                value,
                currency,
                factors.score(),
                evidence,
                related,
                data.as_of,
            );
            result = result.with_severity(if extreme {
                Severity::High
            } else {
                Severity::Medium
            });
            out.push(result);
        }
    }
}

impl Detector for ReturnAbuseDetector {
    fn name(&self) -> &'static str {
        "return_abuse"
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
            let ctx = Self::context(data, refund);
            Self::check_pair(seller_id, sync_id, data, &ctx, &mut results);
        }
        Self::check_serial_returners(seller_id, sync_id, data, &mut results);

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Order, OrderId, ReturnStatus, Sku, TimeMs};

    fn as_of() -> TimeMs {
        TimeMs::new(1_750_000_000_000)
    }

    fn order(id: &str, buyer: Option<&str>, category: Option<&str>, age_days: i64) -> Order {
        Order {
            order_id: OrderId::new(id),
            seller_id: SellerId::new("S1"),
            sku: Sku::new("SKU-1"),
            buyer_id: buyer.map(BuyerId::new),
            order_date: as_of().minus_days(age_days),
            quantity_ordered: 2,
            quantity_shipped: 2,
            unit_price: Decimal::parse("40").unwrap(),
            listed_price: Decimal::parse("40").unwrap(),
            charged_fee: Decimal::parse("12").unwrap(),
            expected_fee: None,
            net_proceeds: None,
            category: category.map(String::from),
            currency: Currency::usd(),
        }
    }

    fn refund(id: &str, order: &str, buyer: Option<&str>, qty: i64, amount: &str, age: i64) -> Refund {
        Refund {
            refund_id: id.to_string(),
            order_id: OrderId::new(order),
            sku: Some(Sku::new("SKU-1")),
            buyer_id: buyer.map(BuyerId::new),
            refund_date: as_of().minus_days(age),
            quantity: qty,
            amount: Decimal::parse(amount).unwrap(),
            currency: Currency::usd(),
            marked_return_status: None,
            restocking_fee_applied: Decimal::ZERO,
        }
    }

    fn a_return(id: &str, order: &str, qty: i64, condition: ItemCondition, age: i64) -> ReturnRecord {
        ReturnRecord {
            return_id: id.to_string(),
            order_id: OrderId::new(order),
            sku: Some(Sku::new("SKU-1")),
            return_date: as_of().minus_days(age),
            quantity: qty,
            status: ReturnStatus::Received,
            condition,
            tracking_confirmed: true,
        }
    }

    fn detect(data: &DetectionDataset) -> Vec<DetectionResult> {
        ReturnAbuseDetector.detect(&SellerId::new("S1"), &SyncId::new("sync"), data)
    }

    fn types(results: &[DetectionResult]) -> Vec<AnomalyType> {
        results.iter().map(|r| r.anomaly_type).collect()
    }

    #[test]
    fn test_no_return_after_grace() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, None, 90)],
            refunds: vec![refund("R-1", "ORD-1", None, 2, "80", 60)],
            ..Default::default()
        };
        let results = detect(&data);
        assert_eq!(types(&results), vec![AnomalyType::ReturnNotReceived]);
        assert_eq!(results[0].estimated_value, Decimal::parse("80").unwrap());
    }

    #[test]
    fn test_no_return_inside_grace_not_flagged() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, None, 60)],
            refunds: vec![refund("R-1", "ORD-1", None, 2, "80", 30)],
            ..Default::default()
        };
        assert!(detect(&data).is_empty());
    }

    #[test]
    fn test_wrong_item_recovers_full_refund() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, None, 40)],
            refunds: vec![refund("R-1", "ORD-1", None, 2, "80", 20)],
            returns: vec![a_return("RET-1", "ORD-1", 2, ItemCondition::WrongItem, 25)],
            ..Default::default()
        };
        let results = detect(&data);
        assert!(types(&results).contains(&AnomalyType::WrongItemReturn));
        let wrong = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::WrongItemReturn)
            .unwrap();
        assert_eq!(wrong.estimated_value, Decimal::parse("80").unwrap());
    }

    #[test]
    fn test_customer_damaged_full_refund_recovers_restocking_fee() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, Some("Apparel"), 25)],
            refunds: vec![refund("R-1", "ORD-1", None, 2, "80", 10)],
            returns: vec![a_return(
                "RET-1",
                "ORD-1",
                2,
                ItemCondition::CustomerDamaged,
                12,
            )],
            ..Default::default()
        };
        let results = detect(&data);
        let damaged = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::DamagedReturnFullRefund)
            .unwrap();
        // Apparel restocking rate 20% of $80.
        assert_eq!(damaged.estimated_value, Decimal::parse("16").unwrap());
    }

    #[test]
    fn test_late_return_flagged() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, None, 80)],
            refunds: vec![refund("R-1", "ORD-1", None, 2, "80", 10)],
            returns: vec![a_return("RET-1", "ORD-1", 2, ItemCondition::Sellable, 20)],
            ..Default::default()
        };
        // Returned 60 days after the order, window is 30.
        let results = detect(&data);
        assert!(types(&results).contains(&AnomalyType::LateReturn));
    }

    #[test]
    fn test_partial_quantity_return() {
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, None, 25)],
            refunds: vec![refund("R-1", "ORD-1", None, 3, "120", 10)],
            returns: vec![a_return("RET-1", "ORD-1", 1, ItemCondition::Sellable, 12)],
            ..Default::default()
        };
        let results = detect(&data);
        let partial = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::PartialReturn)
            .unwrap();
        // 2 missing units x $40 unit refund value.
        assert_eq!(partial.estimated_value, Decimal::parse("80").unwrap());
    }

    #[test]
    fn test_underwithheld_restocking_fee() {
        let mut r = refund("R-1", "ORD-1", None, 2, "80", 10);
        r.restocking_fee_applied = Decimal::parse("5").unwrap();
        let data = DetectionDataset {
            as_of: as_of(),
            orders: vec![order("ORD-1", None, Some("Apparel"), 25)],
            refunds: vec![r],
            returns: vec![a_return(
                "RET-1",
                "ORD-1",
                2,
                ItemCondition::CustomerDamaged,
                12,
            )],
            ..Default::default()
        };
        let results = detect(&data);
        let missing = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::MissingRestockingFee)
            .unwrap();
        // Expected $16, applied $5.
        assert_eq!(missing.estimated_value, Decimal::parse("11").unwrap());
    }

    #[test]
    fn test_serial_returner_medium_tier() {
        let orders: Vec<Order> = (1..=10)
            .map(|i| order(&format!("ORD-{i}"), Some("BUYER-1"), None, 60 + i))
            .collect();
        let refunds: Vec<Refund> = (1..=4)
            .map(|i| {
                let mut r = refund(
                    &format!("R-{i}"),
                    &format!("ORD-{i}"),
                    Some("BUYER-1"),
                    2,
                    "80",
                    20,
                );
                // Avoid the no-return-after-grace sub-check muddying this test.
                r.marked_return_status = Some(ReturnStatus::Received);
                r
            })
            .collect();
        let returns: Vec<ReturnRecord> = (1..=4)
            .map(|i| a_return(&format!("RET-{i}"), &format!("ORD-{i}"), 2, ItemCondition::Sellable, 18))
            .collect();
        let data = DetectionDataset {
            as_of: as_of(),
            orders,
            refunds,
            returns,
            ..Default::default()
        };
        let results = detect(&data);
        let serial = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::SerialReturner)
            .unwrap();
        // 40% return rate, 50% of $320 total refunds.
        assert_eq!(serial.estimated_value, Decimal::parse("160").unwrap());
        assert_eq!(serial.severity, Severity::Medium);
    }

    #[test]
    fn test_serial_returner_extreme_tier_high_severity() {
        let orders: Vec<Order> = (1..=6)
            .map(|i| order(&format!("ORD-{i}"), Some("BUYER-1"), None, 60 + i))
            .collect();
        let refunds: Vec<Refund> = (1..=4)
            .map(|i| {
                let mut r = refund(
                    &format!("R-{i}"),
                    &format!("ORD-{i}"),
                    Some("BUYER-1"),
                    2,
                    "80",
                    20,
                );
                r.marked_return_status = Some(ReturnStatus::Received);
                r
            })
            .collect();
        let returns: Vec<ReturnRecord> = (1..=4)
            .map(|i| a_return(&format!("RET-{i}"), &format!("ORD-{i}"), 2, ItemCondition::Sellable, 18))
            .collect();
        let data = DetectionDataset {
            as_of: as_of(),
            orders,
            refunds,
            returns,
            ..Default::default()
        };
        let results = detect(&data);
        let serial = results
            .iter()
            .find(|r| r.anomaly_type == AnomalyType::SerialReturner)
            .unwrap();
        assert_eq!(serial.severity, Severity::High);
    }

    #[test]
    fn test_few_orders_never_serial() {
        let orders: Vec<Order> = (1..=2)
            .map(|i| order(&format!("ORD-{i}"), Some("BUYER-1"), None, 60))
            .collect();
        let refunds = vec![{
            let mut r = refund("R-1", "ORD-1", Some("BUYER-1"), 2, "80", 20);
            r.marked_return_status = Some(ReturnStatus::Received);
            r
        }];
        let returns = vec![a_return("RET-1", "ORD-1", 2, ItemCondition::Sellable, 18)];
        let data = DetectionDataset {
            as_of: as_of(),
            orders,
            refunds,
            returns,
            ..Default::default()
        };
        let results = detect(&data);
        assert!(!types(&results).contains(&AnomalyType::SerialReturner));
    }

    #[test]
    fn test_restocking_rate_table() {
        assert_eq!(restocking_rate(Some("Apparel")), Decimal::parse("0.20").unwrap());
        assert_eq!(restocking_rate(Some("Books")), Decimal::parse("0.10").unwrap());
        assert_eq!(restocking_rate(Some("Electronics")), Decimal::parse("0.15").unwrap());
        assert_eq!(restocking_rate(None), Decimal::parse("0.15").unwrap());
    }
}
