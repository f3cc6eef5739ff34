//! Product catalog entries and parsed invoice line items.
//!
//! Both feed the claim value calculator's cost and dimension resolution.

use crate::domain::{Decimal, Sku, TimeMs};
use serde::{Deserialize, Serialize};

/// Seller catalog data for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sku: Sku,
    pub asin: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub weight_lb: Option<Decimal>,
    pub length_in: Option<Decimal>,
    pub width_in: Option<Decimal>,
    pub height_in: Option<Decimal>,
    pub category: Option<String>,
}

/// One line item from a parsed supplier invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub invoice_id: String,
    pub sku: Option<Sku>,
    pub asin: Option<String>,
    pub unit_cost: Decimal,
    pub quantity: i64,
    pub invoice_date: TimeMs,
}

impl InvoiceLineItem {
    /// Whether this line matches the given SKU/ASIN pair.
    pub fn matches(&self, sku: &Sku, asin: Option<&str>) -> bool {
        if self.sku.as_ref() == Some(sku) {
            return true;
        }
        match (&self.asin, asin) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
