//! Storage abstractions: the event-store read contract, the result sink,
//! outcome feedback, and the durable FX-rate cache.
//!
//! The engine only ever sees these traits. Production wires the sqlite
//! repository (results, outcomes, rates) and a feed-backed event store;
//! tests substitute the in-memory implementations.

use crate::detectors::DetectionDataset;
use crate::domain::{
    AnomalyType, CatalogEntry, ClaimOutcome, ClaimRecord, Currency, Decimal, DetectionResult,
    InventoryAdjustment, InventorySnapshot, InvoiceLineItem, ListingPerformance, Order,
    OutcomeRecord, Refund, Reimbursement, RemovalEvent, ReturnRecord, SellerId, Shipment, TimeMs,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod db;
pub mod invoices;
pub mod jsonfile;
pub mod memory;

pub use db::{init_db, Repository};
pub use jsonfile::JsonFileEventStore;
pub use memory::{MemoryEventStore, MemoryOutcomeStore, MemoryRateStore, MemoryResultSink};

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Read contract for normalized seller event streams.
///
/// Records are already seller-scoped server-side; the engine does not
/// re-validate ownership. Each fetch covers `[from, to]` inclusive.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch_orders(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Order>, StoreError>;

    async fn fetch_returns(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ReturnRecord>, StoreError>;

    async fn fetch_refunds(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Refund>, StoreError>;

    async fn fetch_reimbursements(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Reimbursement>, StoreError>;

    async fn fetch_snapshots(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventorySnapshot>, StoreError>;

    async fn fetch_adjustments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventoryAdjustment>, StoreError>;

    async fn fetch_shipments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Shipment>, StoreError>;

    async fn fetch_removals(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<RemovalEvent>, StoreError>;

    async fn fetch_claims(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ClaimRecord>, StoreError>;

    async fn fetch_listings(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<ListingPerformance>, StoreError>;

    async fn fetch_catalog(&self, seller_id: &SellerId) -> Result<Vec<CatalogEntry>, StoreError>;

    async fn fetch_invoices(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<InvoiceLineItem>, StoreError>;
}

/// Fetch every collection for one seller, degrading each failed source to
/// an empty collection so one failing feed never aborts a detection run.
pub async fn fetch_dataset_lossy(
    store: &dyn EventStore,
    seller_id: &SellerId,
    lookback_days: i64,
    as_of: TimeMs,
) -> DetectionDataset {
    let from = as_of.minus_days(lookback_days);

    macro_rules! fetch_or_empty {
        ($call:expr, $what:literal) => {
            match $call.await {
                Ok(records) => records,
                Err(e) => {
                    warn!(seller = %seller_id, source = $what, error = %e,
                        "event fetch failed; treating as no data");
                    Vec::new()
                }
            }
        };
    }

    DetectionDataset {
        as_of,
        orders: fetch_or_empty!(store.fetch_orders(seller_id, from, as_of), "orders"),
        returns: fetch_or_empty!(store.fetch_returns(seller_id, from, as_of), "returns"),
        refunds: fetch_or_empty!(store.fetch_refunds(seller_id, from, as_of), "refunds"),
        reimbursements: fetch_or_empty!(
            store.fetch_reimbursements(seller_id, from, as_of),
            "reimbursements"
        ),
        snapshots: fetch_or_empty!(store.fetch_snapshots(seller_id, from, as_of), "snapshots"),
        adjustments: fetch_or_empty!(
            store.fetch_adjustments(seller_id, from, as_of),
            "adjustments"
        ),
        shipments: fetch_or_empty!(store.fetch_shipments(seller_id, from, as_of), "shipments"),
        removals: fetch_or_empty!(store.fetch_removals(seller_id, from, as_of), "removals"),
        claims: fetch_or_empty!(store.fetch_claims(seller_id, from, as_of), "claims"),
        listings: fetch_or_empty!(store.fetch_listings(seller_id), "listings"),
        catalog: fetch_or_empty!(store.fetch_catalog(seller_id), "catalog"),
        invoices: fetch_or_empty!(store.fetch_invoices(seller_id), "invoices"),
    }
}

/// Write contract for persisted detection results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Batch insert; duplicate suppression is the sink's responsibility.
    /// Returns the number of rows written.
    async fn insert_results(&self, results: &[DetectionResult]) -> Result<usize, StoreError>;

    /// Upsert keyed on (seller_id, sync_id, anomaly_type): reruns of the
    /// same batch replace rather than duplicate.
    async fn upsert_result(&self, result: &DetectionResult) -> Result<(), StoreError>;
}

/// Partial update applied to a previously recorded outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeUpdate {
    pub outcome: Option<ClaimOutcome>,
    pub recovery_amount: Option<Decimal>,
    pub resolution_date: Option<TimeMs>,
}

/// Ground-truth store the calibrator learns from.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StoreError>;

    async fn update_outcome(
        &self,
        detection_key: &str,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError>;

    async fn fetch_outcomes(
        &self,
        anomaly_type: AnomalyType,
    ) -> Result<Vec<OutcomeRecord>, StoreError>;
}

/// Durable daily FX-rate cache keyed by (from, to, day). Writes are
/// idempotent upserts so concurrent refreshes converge.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
    ) -> Result<Option<Decimal>, StoreError>;

    async fn put_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
        rate: Decimal,
    ) -> Result<(), StoreError>;
}
