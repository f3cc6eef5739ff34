//! Order line records as reported by the marketplace settlement feed.

use crate::domain::{BuyerId, Currency, Decimal, OrderId, SellerId, Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// A single order line: one SKU within one marketplace order.
///
/// Quantities and amounts are the marketplace's own reported figures; the
/// engine recomputes expectations from them rather than trusting derived
/// columns (net proceeds in particular).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub sku: Sku,
    pub buyer_id: Option<BuyerId>,
    pub order_date: TimeMs,
    /// Units the buyer ordered.
    pub quantity_ordered: i64,
    /// Units actually shipped against this line.
    pub quantity_shipped: i64,
    /// Per-unit price actually charged.
    pub unit_price: Decimal,
    /// Per-unit price the listing advertised at order time.
    pub listed_price: Decimal,
    /// Total marketplace fee charged on this line.
    pub charged_fee: Decimal,
    /// Fee the published fee schedule predicts, when the feed provides it.
    pub expected_fee: Option<Decimal>,
    /// Net proceeds the marketplace reported paying out for this line.
    pub net_proceeds: Option<Decimal>,
    /// Product category, used for referral/restocking rate lookups.
    pub category: Option<String>,
    pub currency: Currency,
}

impl Order {
    /// Gross sale amount for this line (charged price x ordered units).
    pub fn sale_amount(&self) -> Decimal {
        self.unit_price * Decimal::from_i64(self.quantity_ordered)
    }

    /// Proceeds the line should have produced: sale amount minus charged fee.
    pub fn expected_proceeds(&self) -> Decimal {
        self.sale_amount() - self.charged_fee
    }
}
