//! Domain types for the recovery-audit engine.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper and Currency codes
//! - Identifier newtypes and millisecond timestamps with day arithmetic
//! - Immutable event records sourced from the marketplace feeds
//! - DetectionResult, ClaimValuation, and OutcomeRecord output types

pub mod catalog;
pub mod claim;
pub mod detection;
pub mod inventory;
pub mod listing;
pub mod money;
pub mod order;
pub mod outcome;
pub mod primitives;
pub mod returns;
pub mod shipment;
pub mod valuation;

pub use catalog::{CatalogEntry, InvoiceLineItem};
pub use claim::{ClaimRecord, ClaimStatus};
pub use detection::{
    AnomalyType, DetectionResult, DetectionStatus, Evidence, Severity, ALL_ANOMALY_TYPES,
};
pub use inventory::{
    AdjustmentKind, InventoryAdjustment, InventorySnapshot, RemovalEvent, RemovalKind,
};
pub use listing::{DailyListingMetrics, ListingPerformance};
pub use money::{Currency, Decimal};
pub use order::Order;
pub use outcome::{AnomalyTypeAccuracy, ClaimOutcome, OutcomeRecord};
pub use primitives::{BuyerId, CaseId, OrderId, SellerId, Sku, SyncId, TimeMs};
pub use returns::{ItemCondition, Refund, Reimbursement, ReturnRecord, ReturnStatus};
pub use shipment::{Shipment, ShipmentStatus};
pub use valuation::{
    ClaimFacts, ClaimValuation, CostSource, Dimensions, RateSource, SizeTier,
};
