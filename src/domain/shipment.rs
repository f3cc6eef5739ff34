//! Outbound shipment records.

use crate::domain::{Currency, Decimal, OrderId, Sku, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Shipped,
    InTransit,
    Delivered,
    Canceled,
}

/// One outbound shipment against an order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    pub order_id: OrderId,
    pub sku: Option<Sku>,
    pub ship_date: TimeMs,
    pub quantity: i64,
    pub status: ShipmentStatus,
    /// Fulfillment fee the marketplace charged for this shipment.
    pub fulfillment_fee: Decimal,
    pub currency: Currency,
    /// Days of documented carrier delay, zero if none.
    pub carrier_delay_days: i64,
}
