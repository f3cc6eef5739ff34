//! Detection results: the engine's primary output.

use crate::domain::{ClaimFacts, Currency, Decimal, SellerId, SyncId, TimeMs};
use serde::{Deserialize, Serialize};

/// One anomaly class per detector sub-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    // Refund-without-return detector.
    RefundNoReturn,
    // Phantom refund detector.
    PhantomRefund,
    // Return abuse detector.
    ReturnNotReceived,
    WrongItemReturn,
    DamagedReturnFullRefund,
    LateReturn,
    PartialReturn,
    MissingRestockingFee,
    SerialReturner,
    // Shrinkage drift detector.
    InventoryShrinkage,
    // Order-level discrepancy detector.
    QuantityMismatch,
    PriceMismatch,
    FeeOvercharge,
    ProceedsMismatch,
    // Claim workflow gap detector.
    PartialReimbursement,
    ReopenableClaim,
    DeniedWithEvidence,
    ExpiredClaimException,
    StalePendingClaim,
    // Return anomaly detector.
    MissingRestock,
    RefundOvercharge,
    CanceledShipmentFee,
    UnauthorizedDisposal,
    // Silent suppression detector.
    ListingSuppression,
}

impl AnomalyType {
    /// Stable snake_case identifier used in persisted rows and FX/outcome keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::RefundNoReturn => "refund_no_return",
            AnomalyType::PhantomRefund => "phantom_refund",
            AnomalyType::ReturnNotReceived => "return_not_received",
            AnomalyType::WrongItemReturn => "wrong_item_return",
            AnomalyType::DamagedReturnFullRefund => "damaged_return_full_refund",
            AnomalyType::LateReturn => "late_return",
            AnomalyType::PartialReturn => "partial_return",
            AnomalyType::MissingRestockingFee => "missing_restocking_fee",
            AnomalyType::SerialReturner => "serial_returner",
            AnomalyType::InventoryShrinkage => "inventory_shrinkage",
            AnomalyType::QuantityMismatch => "quantity_mismatch",
            AnomalyType::PriceMismatch => "price_mismatch",
            AnomalyType::FeeOvercharge => "fee_overcharge",
            AnomalyType::ProceedsMismatch => "proceeds_mismatch",
            AnomalyType::PartialReimbursement => "partial_reimbursement",
            AnomalyType::ReopenableClaim => "reopenable_claim",
            AnomalyType::DeniedWithEvidence => "denied_with_evidence",
            AnomalyType::ExpiredClaimException => "expired_claim_exception",
            AnomalyType::StalePendingClaim => "stale_pending_claim",
            AnomalyType::MissingRestock => "missing_restock",
            AnomalyType::RefundOvercharge => "refund_overcharge",
            AnomalyType::CanceledShipmentFee => "canceled_shipment_fee",
            AnomalyType::UnauthorizedDisposal => "unauthorized_disposal",
            AnomalyType::ListingSuppression => "listing_suppression",
        }
    }

    /// Parse the persisted identifier back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_ANOMALY_TYPES.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const ALL_ANOMALY_TYPES: [AnomalyType; 24] = [
    AnomalyType::RefundNoReturn,
    AnomalyType::PhantomRefund,
    AnomalyType::ReturnNotReceived,
    AnomalyType::WrongItemReturn,
    AnomalyType::DamagedReturnFullRefund,
    AnomalyType::LateReturn,
    AnomalyType::PartialReturn,
    AnomalyType::MissingRestockingFee,
    AnomalyType::SerialReturner,
    AnomalyType::InventoryShrinkage,
    AnomalyType::QuantityMismatch,
    AnomalyType::PriceMismatch,
    AnomalyType::FeeOvercharge,
    AnomalyType::ProceedsMismatch,
    AnomalyType::PartialReimbursement,
    AnomalyType::ReopenableClaim,
    AnomalyType::DeniedWithEvidence,
    AnomalyType::ExpiredClaimException,
    AnomalyType::StalePendingClaim,
    AnomalyType::MissingRestock,
    AnomalyType::RefundOvercharge,
    AnomalyType::CanceledShipmentFee,
    AnomalyType::UnauthorizedDisposal,
    AnomalyType::ListingSuppression,
];

/// Business-impact tier, independent of confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Default value bands shared across detectors; individual detectors may
    /// promote a band for urgency (deadlines, systematic patterns).
    pub fn from_value(value: &Decimal) -> Self {
        if *value >= Decimal::from_i64(500) {
            Severity::Critical
        } else if *value >= Decimal::from_i64(150) {
            Severity::High
        } else if *value >= Decimal::from_i64(50) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Bump one band, saturating at Critical.
    pub fn promote(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Claim lifecycle state. The engine only ever creates `Pending`; later
/// states are written by external claim workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Pending,
    UnderReview,
    Filed,
    Resolved,
    Dismissed,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionStatus::Pending => "pending",
            DetectionStatus::UnderReview => "under_review",
            DetectionStatus::Filed => "filed",
            DetectionStatus::Resolved => "resolved",
            DetectionStatus::Dismissed => "dismissed",
        }
    }
}

/// Structured justification attached to a detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    /// Human-readable detection reasons, in detection order.
    pub reasons: Vec<String>,
    /// Matched fields and supporting numbers as a JSON object.
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    pub fn field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// One emitted, scored, valued anomaly candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Stable content-hash key; identical inputs produce identical keys.
    pub detection_key: String,
    pub seller_id: SellerId,
    pub sync_id: SyncId,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub estimated_value: Decimal,
    pub currency: Currency,
    /// Self-reported probability the detection is recoverable, 0-1. The
    /// runner overwrites this with the calibrated score; the raw score is
    /// preserved in evidence.
    pub confidence: f64,
    pub evidence: Evidence,
    pub related_event_ids: Vec<String>,
    pub status: DetectionStatus,
    pub discovery_date: TimeMs,
    pub deadline_date: Option<TimeMs>,
    pub days_remaining: Option<i64>,
    /// Raw facts for claim valuation, attached by detectors whose value
    /// rests on item cost rather than a settlement-amount lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_facts: Option<ClaimFacts>,
}

impl DetectionResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seller_id: SellerId,
        sync_id: SyncId,
        anomaly_type: AnomalyType,
        estimated_value: Decimal,
        currency: Currency,
        confidence: f64,
        evidence: Evidence,
        related_event_ids: Vec<String>,
        discovery_date: TimeMs,
    ) -> Self {
        let detection_key =
            Self::compute_detection_key(&seller_id, anomaly_type, &related_event_ids);
        let severity = Severity::from_value(&estimated_value);
        DetectionResult {
            detection_key,
            seller_id,
            sync_id,
            anomaly_type,
            severity,
            estimated_value,
            currency,
            confidence,
            evidence,
            related_event_ids,
            status: DetectionStatus::Pending,
            discovery_date,
            deadline_date: None,
            days_remaining: None,
            claim_facts: None,
        }
    }

    /// Stable key over seller, anomaly type, and the sorted related event
    /// ids, so reruns over the same facts converge on the same key.
    pub fn compute_detection_key(
        seller_id: &SellerId,
        anomaly_type: AnomalyType,
        related_event_ids: &[String],
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut sorted: Vec<&String> = related_event_ids.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        hasher.update(seller_id.as_str());
        hasher.update(anomaly_type.as_str());
        for id in sorted {
            hasher.update(id.as_bytes());
        }
        let hash = hasher.finalize();
        format!("det:{}", hex::encode(&hash[..16]))
    }

    /// Set the filing deadline and derived days-remaining as of `as_of`.
    pub fn with_deadline(mut self, deadline: TimeMs, as_of: TimeMs) -> Self {
        self.days_remaining = Some(deadline.days_since(as_of));
        self.deadline_date = Some(deadline);
        self
    }

    /// Override the value-derived severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach raw facts for downstream claim valuation.
    pub fn with_claim_facts(mut self, facts: ClaimFacts) -> Self {
        self.claim_facts = Some(facts);
        self
    }

    /// Both emission gates: minimum recoverable value and show threshold.
    pub fn passes_gates(&self, min_value: Decimal, show_threshold: f64) -> bool {
        self.estimated_value >= min_value && self.confidence >= show_threshold
    }
}
