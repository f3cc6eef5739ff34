//! Return, refund, and reimbursement records.

use crate::domain::{BuyerId, Currency, Decimal, OrderId, Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// Carrier/warehouse state of a customer return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    /// Return authorized but nothing shipped back yet.
    Pending,
    InTransit,
    /// Carrier delivered the return to the fulfillment center.
    Delivered,
    /// Fulfillment center checked the item in.
    Received,
}

impl ReturnStatus {
    /// Whether the marketplace considers the item physically back.
    pub fn is_back_in_network(&self) -> bool {
        matches!(self, ReturnStatus::Delivered | ReturnStatus::Received)
    }
}

/// Graded condition of a returned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Sellable,
    CustomerDamaged,
    CarrierDamaged,
    Defective,
    /// The buyer sent back a different item than was sold.
    WrongItem,
    Unknown,
}

/// A customer return record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub return_id: String,
    pub order_id: OrderId,
    pub sku: Option<Sku>,
    pub return_date: TimeMs,
    pub quantity: i64,
    pub status: ReturnStatus,
    pub condition: ItemCondition,
    /// True when carrier tracking confirms the return reached the warehouse.
    pub tracking_confirmed: bool,
}

/// A refund issued to a buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub refund_id: String,
    pub order_id: OrderId,
    pub sku: Option<Sku>,
    pub buyer_id: Option<BuyerId>,
    pub refund_date: TimeMs,
    /// Units the refund covers.
    pub quantity: i64,
    pub amount: Decimal,
    pub currency: Currency,
    /// Return state the marketplace stamped on the refund, if any.
    pub marked_return_status: Option<ReturnStatus>,
    /// Restocking fee withheld from the buyer, zero if none.
    pub restocking_fee_applied: Decimal,
}

impl Refund {
    /// Per-unit refund value; zero-quantity refunds fall back to the full amount.
    pub fn unit_value(&self) -> Decimal {
        if self.quantity > 0 {
            self.amount / Decimal::from_i64(self.quantity)
        } else {
            self.amount
        }
    }
}

/// A reimbursement the marketplace already paid the seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reimbursement {
    pub reimbursement_id: String,
    pub order_id: Option<OrderId>,
    pub sku: Option<Sku>,
    pub amount: Decimal,
    pub currency: Currency,
    pub date: TimeMs,
    pub reason: Option<String>,
}
