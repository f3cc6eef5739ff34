//! Marketplace claim/case records.

use crate::domain::{CaseId, Currency, Decimal, OrderId, Sku, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Denied,
    Closed,
}

/// A claim the seller previously filed with the marketplace.
///
/// `event_date` is the date of the underlying loss event (lost shipment,
/// destroyed unit, unreturned refund), which anchors filing-window math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub case_id: CaseId,
    pub order_id: Option<OrderId>,
    pub sku: Option<Sku>,
    pub event_date: TimeMs,
    pub filed_date: TimeMs,
    pub status: ClaimStatus,
    pub requested_amount: Decimal,
    pub reimbursed_amount: Decimal,
    pub currency: Currency,
    /// Free-text resolution note from the marketplace, if the case closed.
    pub resolution_reason: Option<String>,
    /// Last time the marketplace responded on the case.
    pub last_response_date: Option<TimeMs>,
    /// Seller holds proof-of-delivery documentation for the underlying event.
    pub has_proof_of_delivery: bool,
    /// Seller holds a supplier invoice for the item.
    pub has_invoice: bool,
    /// Days of documented carrier delay affecting the underlying event.
    pub carrier_delay_days: i64,
    /// Days of documented marketplace/platform processing delay.
    pub platform_delay_days: i64,
}

impl ClaimRecord {
    /// Shortfall between what was requested and what was reimbursed.
    pub fn reimbursement_shortfall(&self) -> Decimal {
        (self.requested_amount - self.reimbursed_amount).max(Decimal::ZERO)
    }
}
