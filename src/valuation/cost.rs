//! Item cost resolution: a four-tier cascade with a TTL cache.
//!
//! Priority order, each tier only attempted when the previous found nothing:
//! parsed invoice line items, the seller catalog, a margin estimate from
//! order history, and finally a flat default. Resolution always succeeds;
//! weaker tiers just carry less confidence.

use crate::domain::{
    CatalogEntry, CostSource, Decimal, InvoiceLineItem, Order, SellerId, Sku,
};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Assumed cost margin when estimating from historical sale prices.
const MARGIN_ESTIMATE: &str = "0.40";
/// Minimum prior orders before the sale-price estimate is usable.
const MIN_ORDER_SAMPLES: usize = 3;
/// Flat fallback unit cost.
const DEFAULT_UNIT_COST_USD: i64 = 15;

/// A resolved unit cost with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CostResolution {
    pub unit_cost: Decimal,
    pub source: CostSource,
    pub confidence: f64,
}

impl CostResolution {
    fn new(unit_cost: Decimal, source: CostSource) -> Self {
        CostResolution {
            unit_cost,
            source,
            confidence: source.confidence(),
        }
    }
}

/// Resolve a unit cost through the cascade.
pub fn resolve_unit_cost(
    sku: &Sku,
    asin: Option<&str>,
    invoices: &[InvoiceLineItem],
    catalog: &[CatalogEntry],
    orders: &[Order],
) -> CostResolution {
    // Tier 1: parsed invoice line items, most recent match wins.
    if let Some(line) = invoices
        .iter()
        .filter(|l| l.matches(sku, asin))
        .max_by_key(|l| l.invoice_date)
    {
        return CostResolution::new(line.unit_cost, CostSource::Invoice);
    }

    // Tier 2: catalog unit cost.
    if let Some(cost) = catalog
        .iter()
        .find(|e| &e.sku == sku)
        .and_then(|e| e.unit_cost)
    {
        return CostResolution::new(cost, CostSource::Catalog);
    }

    // Tier 3: historical average sale price x margin estimate.
    let prices: Vec<Decimal> = orders
        .iter()
        .filter(|o| &o.sku == sku && o.unit_price.is_positive())
        .map(|o| o.unit_price)
        .collect();
    if prices.len() >= MIN_ORDER_SAMPLES {
        let avg: Decimal =
            prices.iter().copied().sum::<Decimal>() / Decimal::from_i64(prices.len() as i64);
        let margin = Decimal::parse(MARGIN_ESTIMATE).unwrap_or(Decimal::ZERO);
        return CostResolution::new(avg * margin, CostSource::OrderHistory);
    }

    // Tier 4: flat default.
    CostResolution::new(
        Decimal::from_i64(DEFAULT_UNIT_COST_USD),
        CostSource::Default,
    )
}

/// Process-wide cost cache keyed by seller + SKU with a TTL.
///
/// Injected rather than global so tests can substitute a short TTL and
/// detectors stay pure.
pub struct CostCache {
    ttl: Duration,
    inner: RwLock<HashMap<(SellerId, Sku), (Instant, CostResolution)>>,
}

impl CostCache {
    pub fn new(ttl: Duration) -> Self {
        CostCache {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, seller_id: &SellerId, sku: &Sku) -> Option<CostResolution> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard
            .get(&(seller_id.clone(), sku.clone()))
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, res)| res.clone())
    }

    pub fn put(&self, seller_id: &SellerId, sku: &Sku, resolution: CostResolution) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(
            (seller_id.clone(), sku.clone()),
            (Instant::now(), resolution),
        );
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, OrderId, TimeMs};

    fn invoice_line(sku: &str, cost: &str, day: i64) -> InvoiceLineItem {
        InvoiceLineItem {
            invoice_id: format!("INV-{day}"),
            sku: Some(Sku::new(sku)),
            asin: None,
            unit_cost: Decimal::parse(cost).unwrap(),
            quantity: 10,
            invoice_date: TimeMs::new(0).plus_days(day),
        }
    }

    fn catalog_entry(sku: &str, cost: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            sku: Sku::new(sku),
            asin: None,
            unit_cost: cost.map(|c| Decimal::parse(c).unwrap()),
            weight_lb: None,
            length_in: None,
            width_in: None,
            height_in: None,
            category: None,
        }
    }

    fn order(sku: &str, price: &str, n: i64) -> Order {
        Order {
            order_id: OrderId::new(format!("ORD-{n}")),
            seller_id: SellerId::new("S1"),
            sku: Sku::new(sku),
            buyer_id: None,
            order_date: TimeMs::new(0).plus_days(n),
            quantity_ordered: 1,
            quantity_shipped: 1,
            unit_price: Decimal::parse(price).unwrap(),
            listed_price: Decimal::parse(price).unwrap(),
            charged_fee: Decimal::ZERO,
            expected_fee: None,
            net_proceeds: None,
            category: None,
            currency: Currency::usd(),
        }
    }

    #[test]
    fn test_invoice_tier_wins() {
        let resolution = resolve_unit_cost(
            &Sku::new("SKU-1"),
            None,
            &[invoice_line("SKU-1", "12.50", 1)],
            &[catalog_entry("SKU-1", Some("10"))],
            &[],
        );
        assert_eq!(resolution.source, CostSource::Invoice);
        assert_eq!(resolution.unit_cost, Decimal::parse("12.50").unwrap());
        assert_eq!(resolution.confidence, 0.95);
    }

    #[test]
    fn test_most_recent_invoice_wins() {
        let resolution = resolve_unit_cost(
            &Sku::new("SKU-1"),
            None,
            &[
                invoice_line("SKU-1", "10", 1),
                invoice_line("SKU-1", "13", 30),
            ],
            &[],
            &[],
        );
        assert_eq!(resolution.unit_cost, Decimal::parse("13").unwrap());
    }

    #[test]
    fn test_catalog_tier() {
        let resolution = resolve_unit_cost(
            &Sku::new("SKU-1"),
            None,
            &[],
            &[catalog_entry("SKU-1", Some("10"))],
            &[],
        );
        assert_eq!(resolution.source, CostSource::Catalog);
        assert_eq!(resolution.confidence, 0.85);
    }

    #[test]
    fn test_order_history_tier_needs_three_samples() {
        let orders: Vec<Order> = (0..3).map(|n| order("SKU-1", "50", n)).collect();
        let resolution = resolve_unit_cost(&Sku::new("SKU-1"), None, &[], &[], &orders);
        assert_eq!(resolution.source, CostSource::OrderHistory);
        // $50 average x 0.40 margin.
        assert_eq!(resolution.unit_cost, Decimal::parse("20").unwrap());
        assert_eq!(resolution.confidence, 0.60);
    }

    #[test]
    fn test_two_samples_fall_through_to_default() {
        let orders: Vec<Order> = (0..2).map(|n| order("SKU-1", "50", n)).collect();
        let resolution = resolve_unit_cost(&Sku::new("SKU-1"), None, &[], &[], &orders);
        assert_eq!(resolution.source, CostSource::Default);
        assert_eq!(resolution.unit_cost, Decimal::parse("15").unwrap());
        assert_eq!(resolution.confidence, 0.30);
    }

    #[test]
    fn test_catalog_without_cost_falls_through() {
        let resolution = resolve_unit_cost(
            &Sku::new("SKU-1"),
            None,
            &[],
            &[catalog_entry("SKU-1", None)],
            &[],
        );
        assert_eq!(resolution.source, CostSource::Default);
    }

    #[test]
    fn test_cache_round_trip_and_ttl() {
        let cache = CostCache::new(Duration::from_secs(60));
        let seller = SellerId::new("S1");
        let sku = Sku::new("SKU-1");
        assert!(cache.get(&seller, &sku).is_none());

        let resolution =
            CostResolution::new(Decimal::parse("9.99").unwrap(), CostSource::Catalog);
        cache.put(&seller, &sku, resolution.clone());
        assert_eq!(cache.get(&seller, &sku), Some(resolution));

        let expired = CostCache::new(Duration::from_secs(0));
        expired.put(
            &seller,
            &sku,
            CostResolution::new(Decimal::ONE, CostSource::Default),
        );
        assert!(expired.get(&seller, &sku).is_none());
    }
}
