//! Claim outcome records and the per-anomaly-type accuracy rollup.

use crate::domain::{AnomalyType, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// What actually happened to a previously emitted detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Approved,
    Rejected,
    Partial,
    Pending,
    Expired,
}

impl ClaimOutcome {
    /// Resolved outcomes count toward calibration samples; pending does not.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ClaimOutcome::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimOutcome::Approved => "approved",
            ClaimOutcome::Rejected => "rejected",
            ClaimOutcome::Partial => "partial",
            ClaimOutcome::Pending => "pending",
            ClaimOutcome::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ClaimOutcome::Approved),
            "rejected" => Some(ClaimOutcome::Rejected),
            "partial" => Some(ClaimOutcome::Partial),
            "pending" => Some(ClaimOutcome::Pending),
            "expired" => Some(ClaimOutcome::Expired),
            _ => None,
        }
    }
}

/// Ground-truth record for one resolved (or in-flight) claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// The detection this outcome belongs to.
    pub detection_key: String,
    pub anomaly_type: AnomalyType,
    /// Confidence the engine predicted when the detection was emitted.
    pub predicted_confidence: f64,
    pub outcome: ClaimOutcome,
    /// Amount the detection estimated as recoverable.
    pub claimed_amount: Decimal,
    /// Amount actually recovered.
    pub recovery_amount: Decimal,
    pub filed_date: Option<TimeMs>,
    pub resolution_date: Option<TimeMs>,
    pub recorded_at: TimeMs,
}

/// Historical accuracy rollup for one anomaly type.
///
/// Rebuilt from outcome records; cached process-wide with a TTL by the
/// calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyTypeAccuracy {
    pub anomaly_type: AnomalyType,
    pub total_claims: usize,
    pub approved: usize,
    pub rejected: usize,
    pub partial: usize,
    pub expired: usize,
    pub pending: usize,
    /// Share of resolved claims that recovered money (approved + partial).
    pub approval_rate: f64,
    pub avg_predicted_confidence: f64,
    /// Average recovered / claimed across resolved claims with a claim amount.
    pub avg_recovery_pct: f64,
    pub avg_days_to_resolution: f64,
    pub total_recovered: Decimal,
}

impl AnomalyTypeAccuracy {
    /// Number of resolved claims usable as calibration samples.
    pub fn resolved_samples(&self) -> usize {
        self.approved + self.rejected + self.partial + self.expired
    }

    /// Build the rollup from raw outcome records of one anomaly type.
    pub fn from_records(anomaly_type: AnomalyType, records: &[OutcomeRecord]) -> Self {
        let mut approved = 0usize;
        let mut rejected = 0usize;
        let mut partial = 0usize;
        let mut expired = 0usize;
        let mut pending = 0usize;
        let mut confidence_sum = 0.0f64;
        let mut recovery_pct_sum = 0.0f64;
        let mut recovery_pct_count = 0usize;
        let mut resolution_days_sum = 0.0f64;
        let mut resolution_days_count = 0usize;
        let mut total_recovered = Decimal::ZERO;

        for record in records {
            debug_assert_eq!(record.anomaly_type, anomaly_type);
            match record.outcome {
                ClaimOutcome::Approved => approved += 1,
                ClaimOutcome::Rejected => rejected += 1,
                ClaimOutcome::Partial => partial += 1,
                ClaimOutcome::Expired => expired += 1,
                ClaimOutcome::Pending => pending += 1,
            }
            confidence_sum += record.predicted_confidence;
            total_recovered = total_recovered + record.recovery_amount;

            if record.outcome.is_resolved() && record.claimed_amount.is_positive() {
                let pct = (record.recovery_amount / record.claimed_amount).to_f64_lossy();
                recovery_pct_sum += pct;
                recovery_pct_count += 1;
            }
            if let (Some(filed), Some(resolved)) = (record.filed_date, record.resolution_date) {
                resolution_days_sum += resolved.days_since(filed) as f64;
                resolution_days_count += 1;
            }
        }

        let total = records.len();
        let resolved = approved + rejected + partial + expired;
        let approval_rate = if resolved > 0 {
            (approved + partial) as f64 / resolved as f64
        } else {
            0.0
        };

        AnomalyTypeAccuracy {
            anomaly_type,
            total_claims: total,
            approved,
            rejected,
            partial,
            expired,
            pending,
            approval_rate,
            avg_predicted_confidence: if total > 0 {
                confidence_sum / total as f64
            } else {
                0.0
            },
            avg_recovery_pct: if recovery_pct_count > 0 {
                recovery_pct_sum / recovery_pct_count as f64
            } else {
                0.0
            },
            avg_days_to_resolution: if resolution_days_count > 0 {
                resolution_days_sum / resolution_days_count as f64
            } else {
                0.0
            },
            total_recovered,
        }
    }
}
