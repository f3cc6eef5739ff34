//! Domain primitives: identifiers and timestamps.

use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Whole days elapsed from `earlier` to `self` (negative if `self` is earlier).
    pub fn days_since(&self, earlier: TimeMs) -> i64 {
        (self.0 - earlier.0) / MS_PER_DAY
    }

    /// The timestamp `days` whole days before this one.
    pub fn minus_days(&self, days: i64) -> Self {
        TimeMs(self.0 - days * MS_PER_DAY)
    }

    /// The timestamp `days` whole days after this one.
    pub fn plus_days(&self, days: i64) -> Self {
        TimeMs(self.0 + days * MS_PER_DAY)
    }

    /// UTC calendar day key (`YYYY-MM-DD`), used to key daily FX rates.
    pub fn day_key(&self) -> String {
        let secs = self.0.div_euclid(1000);
        let dt = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default();
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Marketplace seller account identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SellerId(pub String);

impl SellerId {
    pub fn new(id: impl Into<String>) -> Self {
        SellerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SellerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stock keeping unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sku(pub String);

impl Sku {
    pub fn new(sku: impl Into<String>) -> Self {
        Sku(sku.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marketplace order identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        OrderId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buyer account identifier (opaque, marketplace-scoped).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuyerId(pub String);

impl BuyerId {
    pub fn new(id: impl Into<String>) -> Self {
        BuyerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Claim/case identifier from the marketplace's case system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        CaseId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Batch correlation id: all detections produced from one data-refresh run
/// for a seller share the same sync id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncId(pub String);

impl SyncId {
    pub fn new(id: impl Into<String>) -> Self {
        SyncId(id.into())
    }

    /// Generate a fresh random sync id for a new run.
    pub fn generate() -> Self {
        SyncId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
