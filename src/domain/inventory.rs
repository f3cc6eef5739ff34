//! Inventory snapshots, ledger adjustments, and removal events.

use crate::domain::{OrderId, Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// Point-in-time on-hand quantity for one SKU, typically one per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub sku: Sku,
    pub snapshot_date: TimeMs,
    pub quantity_on_hand: i64,
    /// Units in inbound shipments not yet received.
    pub quantity_inbound: i64,
}

/// Reason class on an inventory ledger adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Positive credit when a customer return is checked back in.
    CustomerReturn,
    Damaged,
    Lost,
    Found,
    /// Inventory destroyed or disposed of by the fulfillment network.
    Disposed,
    /// Manual count correction.
    Correction,
    Other,
}

/// A signed inventory ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub adjustment_id: String,
    pub sku: Sku,
    /// Order the adjustment traces back to, when the ledger links one.
    pub order_id: Option<OrderId>,
    pub adjustment_date: TimeMs,
    /// Positive = units added to on-hand, negative = removed.
    pub quantity_delta: i64,
    pub kind: AdjustmentKind,
    /// Whether the seller authorized this adjustment (disposals in particular).
    pub seller_authorized: bool,
    pub reason: Option<String>,
}

/// Category of a removal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalKind {
    /// Returned to the seller's own address.
    Return,
    Disposal,
    Liquidation,
    Other,
}

/// Units leaving the fulfillment network via a removal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalEvent {
    pub removal_id: String,
    pub sku: Sku,
    pub removal_date: TimeMs,
    pub quantity: i64,
    pub kind: RemovalKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_kind_serialization() {
        let json = serde_json::to_string(&AdjustmentKind::CustomerReturn).unwrap();
        assert_eq!(json, "\"customer_return\"");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snap = InventorySnapshot {
            sku: Sku::new("SKU-1"),
            snapshot_date: TimeMs::new(1000),
            quantity_on_hand: 42,
            quantity_inbound: 5,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: InventorySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }
}
