//! In-memory store implementations for tests and offline runs.

use super::{EventStore, OutcomeStore, OutcomeUpdate, RateStore, ResultSink, StoreError};
use crate::domain::{
    AnomalyType, CatalogEntry, ClaimRecord, Currency, Decimal, DetectionResult,
    InventoryAdjustment, InventorySnapshot, InvoiceLineItem, ListingPerformance, Order,
    OutcomeRecord, Refund, Reimbursement, RemovalEvent, ReturnRecord, SellerId, Shipment, TimeMs,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Per-seller event collections backing the memory event store.
#[derive(Debug, Clone, Default)]
pub struct SellerEvents {
    pub orders: Vec<Order>,
    pub returns: Vec<ReturnRecord>,
    pub refunds: Vec<Refund>,
    pub reimbursements: Vec<Reimbursement>,
    pub snapshots: Vec<InventorySnapshot>,
    pub adjustments: Vec<InventoryAdjustment>,
    pub shipments: Vec<Shipment>,
    pub removals: Vec<RemovalEvent>,
    pub claims: Vec<ClaimRecord>,
    pub listings: Vec<ListingPerformance>,
    pub catalog: Vec<CatalogEntry>,
    pub invoices: Vec<InvoiceLineItem>,
}

/// Event store over in-memory fixtures, with per-source failure injection
/// for exercising degraded-fetch behavior.
#[derive(Default)]
pub struct MemoryEventStore {
    sellers: RwLock<HashMap<SellerId, SellerEvents>>,
    failing_sources: RwLock<HashSet<String>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_seller(&self, seller_id: SellerId, events: SellerEvents) {
        let mut guard = self.sellers.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(seller_id, events);
    }

    /// Make one named source ("orders", "refunds", ...) fail on fetch.
    pub fn fail_source(&self, source: &str) {
        let mut guard = self
            .failing_sources
            .write()
            .unwrap_or_else(|e| e.into_inner());
        guard.insert(source.to_string());
    }

    fn check_failure(&self, source: &str) -> Result<(), StoreError> {
        let guard = self
            .failing_sources
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if guard.contains(source) {
            return Err(StoreError::Other(format!("{source} source unavailable")));
        }
        Ok(())
    }

    fn with_seller<T>(
        &self,
        seller_id: &SellerId,
        f: impl FnOnce(&SellerEvents) -> T,
        default: T,
    ) -> T {
        let guard = self.sellers.read().unwrap_or_else(|e| e.into_inner());
        guard.get(seller_id).map(f).unwrap_or(default)
    }
}

fn in_window<T>(records: &[T], date: impl Fn(&T) -> TimeMs, from: TimeMs, to: TimeMs) -> Vec<T>
where
    T: Clone,
{
    records
        .iter()
        .filter(|r| {
            let d = date(r);
            d >= from && d <= to
        })
        .cloned()
        .collect()
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn fetch_orders(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Order>, StoreError> {
        self.check_failure("orders")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.orders, |o| o.order_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_returns(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ReturnRecord>, StoreError> {
        self.check_failure("returns")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.returns, |r| r.return_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_refunds(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Refund>, StoreError> {
        self.check_failure("refunds")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.refunds, |r| r.refund_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_reimbursements(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Reimbursement>, StoreError> {
        self.check_failure("reimbursements")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.reimbursements, |r| r.date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_snapshots(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventorySnapshot>, StoreError> {
        self.check_failure("snapshots")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.snapshots, |r| r.snapshot_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_adjustments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InventoryAdjustment>, StoreError> {
        self.check_failure("adjustments")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.adjustments, |r| r.adjustment_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_shipments(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Shipment>, StoreError> {
        self.check_failure("shipments")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.shipments, |r| r.ship_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_removals(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<RemovalEvent>, StoreError> {
        self.check_failure("removals")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.removals, |r| r.removal_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_claims(
        &self,
        seller_id: &SellerId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<ClaimRecord>, StoreError> {
        self.check_failure("claims")?;
        Ok(self.with_seller(
            seller_id,
            |s| in_window(&s.claims, |r| r.filed_date, from, to),
            Vec::new(),
        ))
    }

    async fn fetch_listings(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<ListingPerformance>, StoreError> {
        self.check_failure("listings")?;
        Ok(self.with_seller(seller_id, |s| s.listings.clone(), Vec::new()))
    }

    async fn fetch_catalog(&self, seller_id: &SellerId) -> Result<Vec<CatalogEntry>, StoreError> {
        self.check_failure("catalog")?;
        Ok(self.with_seller(seller_id, |s| s.catalog.clone(), Vec::new()))
    }

    async fn fetch_invoices(
        &self,
        seller_id: &SellerId,
    ) -> Result<Vec<InvoiceLineItem>, StoreError> {
        self.check_failure("invoices")?;
        Ok(self.with_seller(seller_id, |s| s.invoices.clone(), Vec::new()))
    }
}

/// Result sink collecting rows in memory.
#[derive(Default)]
pub struct MemoryResultSink {
    results: RwLock<Vec<DetectionResult>>,
    fail_writes: AtomicBool,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn results(&self) -> Vec<DetectionResult> {
        self.results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn insert_results(&self, results: &[DetectionResult]) -> Result<usize, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("sink unavailable".to_string()));
        }
        let mut guard = self.results.write().unwrap_or_else(|e| e.into_inner());
        guard.extend_from_slice(results);
        Ok(results.len())
    }

    async fn upsert_result(&self, result: &DetectionResult) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("sink unavailable".to_string()));
        }
        let mut guard = self.results.write().unwrap_or_else(|e| e.into_inner());
        let existing = guard.iter_mut().find(|r| {
            r.seller_id == result.seller_id
                && r.sync_id == result.sync_id
                && r.anomaly_type == result.anomaly_type
                && r.detection_key == result.detection_key
        });
        match existing {
            Some(row) => *row = result.clone(),
            None => guard.push(result.clone()),
        }
        Ok(())
    }
}

/// Outcome store over a plain vector; record is an idempotent upsert on the
/// detection key.
#[derive(Default)]
pub struct MemoryOutcomeStore {
    records: RwLock<Vec<OutcomeRecord>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StoreError> {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        match guard
            .iter_mut()
            .find(|r| r.detection_key == record.detection_key)
        {
            Some(existing) => *existing = record.clone(),
            None => guard.push(record.clone()),
        }
        Ok(())
    }

    async fn update_outcome(
        &self,
        detection_key: &str,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError> {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = guard
            .iter_mut()
            .find(|r| r.detection_key == detection_key)
            .ok_or_else(|| StoreError::Other(format!("no outcome for {detection_key}")))?;
        if let Some(outcome) = update.outcome {
            record.outcome = outcome;
        }
        if let Some(amount) = update.recovery_amount {
            record.recovery_amount = amount;
        }
        if let Some(date) = update.resolution_date {
            record.resolution_date = Some(date);
        }
        Ok(())
    }

    async fn fetch_outcomes(
        &self,
        anomaly_type: AnomalyType,
    ) -> Result<Vec<OutcomeRecord>, StoreError> {
        let guard = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .iter()
            .filter(|r| r.anomaly_type == anomaly_type)
            .cloned()
            .collect())
    }
}

/// Rate store over a hash map keyed by (from, to, day).
#[derive(Default)]
pub struct MemoryRateStore {
    rates: RwLock<HashMap<(String, String, String), Decimal>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        let guard = self.rates.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .get(&(
                from.as_str().to_string(),
                to.as_str().to_string(),
                day.to_string(),
            ))
            .copied())
    }

    async fn put_rate(
        &self,
        from: &Currency,
        to: &Currency,
        day: &str,
        rate: Decimal,
    ) -> Result<(), StoreError> {
        let mut guard = self.rates.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(
            (
                from.as_str().to_string(),
                to.as_str().to_string(),
                day.to_string(),
            ),
            rate,
        );
        Ok(())
    }
}
