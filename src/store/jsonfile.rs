//! JSON-export event store backing the CLI batch runner.
//!
//! Reads one `{events_dir}/{seller_id}.json` file per seller holding every
//! normalized collection, plus optional invoice CSVs from an invoice
//! directory. The upstream sync pipeline owns producing these exports.

use super::{EventStore, StoreError};
use crate::domain::{
    CatalogEntry, ClaimRecord, InventoryAdjustment, InventorySnapshot, InvoiceLineItem,
    ListingPerformance, Order, Refund, Reimbursement, RemovalEvent, ReturnRecord, SellerId,
    Shipment, TimeMs,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

/// On-disk export shape: all collections optional so partial exports load.
#[derive(Debug, Default, Deserialize)]
pub struct SellerExport {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub returns: Vec<ReturnRecord>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
    #[serde(default)]
    pub reimbursements: Vec<Reimbursement>,
    #[serde(default)]
    pub snapshots: Vec<InventorySnapshot>,
    #[serde(default)]
    pub adjustments: Vec<InventoryAdjustment>,
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub removals: Vec<RemovalEvent>,
    #[serde(default)]
    pub claims: Vec<ClaimRecord>,
    #[serde(default)]
    pub listings: Vec<ListingPerformance>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

pub struct JsonFileEventStore {
    events_dir: PathBuf,
    invoice_dir: Option<PathBuf>,
}

impl JsonFileEventStore {
    pub fn new(events_dir: PathBuf, invoice_dir: Option<PathBuf>) -> Self {
        Self {
            events_dir,
            invoice_dir,
        }
    }

    fn load_export(&self, seller_id: &SellerId) -> Result<SellerExport, StoreError> {
        let path = self.events_dir.join(format!("{}.json", seller_id.as_str()));
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn window<T>(records: Vec<T>, date: impl Fn(&T) -> TimeMs, from: TimeMs, to: TimeMs) -> Vec<T> {
    records
        .into_iter()
        .filter(|r| {
            let d = date(r);
            d >= from && d <= to
        })
        .collect()
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    async fn fetch_orders(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.orders,
            |o| o.order_date,
            from,
            to,
        ))
    }

    async fn fetch_returns(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ReturnRecord>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.returns,
            |r| r.return_date,
            from,
            to,
        ))
    }

    async fn fetch_refunds(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Refund>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.refunds,
            |r| r.refund_date,
            from,
            to,
        ))
    }

    async fn fetch_reimbursements(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Reimbursement>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.reimbursements,
            |r| r.date,
            from,
            to,
        ))
    }

    async fn fetch_snapshots(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventorySnapshot>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.snapshots,
            |s| s.snapshot_date,
            from,
            to,
        ))
    }

    async fn fetch_adjustments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventoryAdjustment>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.adjustments,
            |a| a.adjustment_date,
            from,
            to,
        ))
    }

    async fn fetch_shipments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Shipment>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.shipments,
            |s| s.ship_date,
            from,
            to,
        ))
    }

    async fn fetch_removals(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<RemovalEvent>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.removals,
            |r| r.removal_date,
            from,
            to,
        ))
    }

    async fn fetch_claims(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        Ok(window(
            self.load_export(seller_id)?.claims,
            |c| c.filed_date,
            from,
            to,
        ))
    }

    async fn fetch_listings(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<ListingPerformance>, StoreError> {
        Ok(self.load_export(seller_id)?.listings)
    }

    async fn fetch_catalog(&self, seller_id: &SellerId) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.load_export(seller_id)?.catalog)
    }

    async fn fetch_invoices(
        &self,
        _seller_id: &SellerId,
    ) -> Result<Vec<InvoiceLineItem>, StoreError> {
        match &self.invoice_dir {
            Some(dir) => Ok(super::invoices::load_invoice_dir(dir)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Decimal, OrderId, Sku};

    fn export_json() -> String {
        serde_json::json!({
            "refunds": [{
                "refund_id": "R-1",
                "order_id": "ORD-1",
                "sku": "SKU-1",
                "buyer_id": null,
                "refund_date": 1_705_320_000_000i64,
                "quantity": 1,
                "amount": 50.0,
                "currency": "USD",
                "marked_return_status": null,
                "restocking_fee_applied": 0.0
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_load_refunds_from_export() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("S1.json"), export_json()).unwrap();
        let store = JsonFileEventStore::new(dir.path().to_path_buf(), None);

        let refunds = store
            .fetch_refunds(
                &SellerId::new("S1"),
                TimeMs::new(0),
                TimeMs::new(2_000_000_000_000),
            )
            .await
            .unwrap();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].order_id, OrderId::new("ORD-1"));
        assert_eq!(refunds[0].sku, Some(Sku::new("SKU-1")));
        assert_eq!(refunds[0].amount, Decimal::parse("50").unwrap());
        assert_eq!(refunds[0].currency, Currency::usd());
    }

    #[tokio::test]
    async fn test_window_filtering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("S1.json"), export_json()).unwrap();
        let store = JsonFileEventStore::new(dir.path().to_path_buf(), None);

        let refunds = store
            .fetch_refunds(&SellerId::new("S1"), TimeMs::new(0), TimeMs::new(1))
            .await
            .unwrap();
        assert!(refunds.is_empty());
    }

    #[tokio::test]
    async fn test_missing_seller_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileEventStore::new(dir.path().to_path_buf(), None);
        let result = store
            .fetch_orders(&SellerId::new("GHOST"), TimeMs::new(0), TimeMs::new(1))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_partial_export_loads_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("S1.json"), "{}").unwrap();
        let store = JsonFileEventStore::new(dir.path().to_path_buf(), None);
        let orders = store
            .fetch_orders(&SellerId::new("S1"), TimeMs::new(0), TimeMs::new(1))
            .await
            .unwrap();
        assert!(orders.is_empty());
    }
}
