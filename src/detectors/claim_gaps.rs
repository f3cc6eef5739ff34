//! Claim workflow gap detection.
//!
//! Closed or stalled claims frequently leave money behind: partial payouts,
//! boilerplate denials that a human appeal reopens, denials contradicted by
//! evidence the seller already holds, windows that a documented delay
//! exception extends, and pending cases nobody is chasing. Each gap type
//! carries a recovery-probability heuristic and a canned action-step list.

use super::{gate_and_rank, DetectionDataset, Detector};
use crate::domain::{
    AnomalyType, ClaimRecord, ClaimStatus, Decimal, DetectionResult, Evidence, SellerId, Severity,
    SyncId,
};

/// Shortfall must be at least this share of the requested amount...
const PARTIAL_SHORTFALL_RATIO: &str = "0.10";
/// ...and at least this many dollars.
const PARTIAL_SHORTFALL_MIN_USD: i64 = 10;
/// Pending claims quiet for this long need a nudge.
const STALE_PENDING_DAYS: i64 = 7;
/// Standard filing/appeal window measured from the underlying event.
const STANDARD_WINDOW_DAYS: i64 = 60;

/// Boilerplate denial phrases that historically reopen on appeal.
const GENERIC_DENIAL_PHRASES: [&str; 6] = [
    "per policy",
    "not eligible",
    "insufficient information",
    "unable to verify",
    "outside policy",
    "no reimbursement warranted",
];

/// Recovery-probability heuristics per gap type.
const PARTIAL_RECOVERY_PROBABILITY: f64 = 0.70;
const REOPEN_RECOVERY_PROBABILITY: f64 = 0.60;
const EVIDENCE_RECOVERY_PROBABILITY: f64 = 0.65;
const EXCEPTION_RECOVERY_PROBABILITY: f64 = 0.58;
const STALE_RECOVERY_PROBABILITY: f64 = 0.75;

/// Deadlines inside a week promote severity one band.
const URGENT_DEADLINE_DAYS: i64 = 7;

const MIN_VALUE_USD: i64 = 10;
const SHOW_THRESHOLD: f64 = 0.55;

pub struct ClaimWorkflowGapDetector;

impl ClaimWorkflowGapDetector {
    fn emit(
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
        claim: &ClaimRecord,
        anomaly_type: AnomalyType,
        value: Decimal,
        confidence: f64,
        reason: String,
        action_steps: &[&str],
    ) -> DetectionResult {
        let evidence = Evidence::new()
            .reason(reason)
            .field("requested_amount", serde_json::json!(claim.requested_amount))
            .field(
                "reimbursed_amount",
                serde_json::json!(claim.reimbursed_amount),
            )
            .field("claim_status", serde_json::json!(format!("{:?}", claim.status)))
            .field(
                "action_steps",
                serde_json::json!(action_steps
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()),
            );

        DetectionResult::new(
            seller_id.clone(),
            sync_id.clone(),
            anomaly_type,
            value,
            claim.currency.clone(),
            confidence,
            evidence,
            vec![claim.case_id.0.clone()],
            data.as_of,
        )
    }

    fn is_generic_denial(reason: &str) -> bool {
        let lower = reason.to_ascii_lowercase();
        GENERIC_DENIAL_PHRASES
            .iter()
            .any(|phrase| lower.contains(phrase))
    }

    /// Extended filing deadline once documented delays are credited.
    fn exception_deadline(claim: &ClaimRecord) -> crate::domain::TimeMs {
        claim.event_date.plus_days(
            STANDARD_WINDOW_DAYS + claim.carrier_delay_days + claim.platform_delay_days,
        )
    }
}

impl Detector for ClaimWorkflowGapDetector {
    fn name(&self) -> &'static str {
        "claim_workflow_gaps"
    }

    fn min_value(&self) -> Decimal {
        Decimal::from_i64(MIN_VALUE_USD)
    }

    fn show_threshold(&self) -> f64 {
        SHOW_THRESHOLD
    }

    fn detect(
        &self,
        seller_id: &SellerId,
        sync_id: &SyncId,
        data: &DetectionDataset,
    ) -> Vec<DetectionResult> {
        let mut results = Vec::new();

        for claim in &data.claims {
            let shortfall = claim.reimbursement_shortfall();

            // Partial reimbursement on an otherwise settled claim.
            if matches!(claim.status, ClaimStatus::Approved | ClaimStatus::Closed)
                && claim.requested_amount.is_positive()
                && claim.reimbursed_amount.is_positive()
            {
                let ratio = Decimal::parse(PARTIAL_SHORTFALL_RATIO).unwrap_or(Decimal::ZERO);
                if shortfall >= claim.requested_amount * ratio
                    && shortfall >= Decimal::from_i64(PARTIAL_SHORTFALL_MIN_USD)
                {
                    results.push(Self::emit(
                        seller_id,
                        sync_id,
                        data,
                        claim,
                        AnomalyType::PartialReimbursement,
                        shortfall,
                        PARTIAL_RECOVERY_PROBABILITY,
                        format!(
                            "claim {} settled {} short of the requested amount",
                            claim.case_id.as_str(),
                            shortfall
                        ),
                        &[
                            "Compare reimbursed amount against the documented item cost",
                            "File a follow-up case citing the valuation gap",
                        ],
                    ));
                }
            }

            // Auto-closed with a boilerplate denial phrase.
            if matches!(claim.status, ClaimStatus::Denied | ClaimStatus::Closed) {
                if let Some(reason) = &claim.resolution_reason {
                    if Self::is_generic_denial(reason) && shortfall.is_positive() {
                        results.push(Self::emit(
                            seller_id,
                            sync_id,
                            data,
                            claim,
                            AnomalyType::ReopenableClaim,
                            shortfall,
                            REOPEN_RECOVERY_PROBABILITY,
                            format!(
                                "claim {} closed with generic denial: \"{}\"",
                                claim.case_id.as_str(),
                                reason
                            ),
                            &[
                                "Reopen the case and request a specific denial basis",
                                "Escalate to seller support if the denial is restated verbatim",
                            ],
                        ));
                    }
                }
            }

            // Denied while the seller holds contradicting documentation.
            if claim.status == ClaimStatus::Denied
                && (claim.has_proof_of_delivery || claim.has_invoice)
                && shortfall.is_positive()
            {
                let held: Vec<&str> = [
                    claim.has_proof_of_delivery.then_some("proof_of_delivery"),
                    claim.has_invoice.then_some("invoice"),
                ]
                .into_iter()
                .flatten()
                .collect();
                results.push(Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    claim,
                    AnomalyType::DeniedWithEvidence,
                    shortfall,
                    EVIDENCE_RECOVERY_PROBABILITY,
                    format!(
                        "claim {} denied while seller holds {}",
                        claim.case_id.as_str(),
                        held.join(" and ")
                    ),
                    &[
                        "Attach the held documentation to an appeal",
                        "Reference the original case id in the new filing",
                    ],
                ));
            }

            // Standard window exceeded, but a delay exception is still open.
            let standard_deadline = claim.event_date.plus_days(STANDARD_WINDOW_DAYS);
            let extended_deadline = Self::exception_deadline(claim);
            if matches!(claim.status, ClaimStatus::Denied | ClaimStatus::Closed)
                && data.as_of > standard_deadline
                && data.as_of < extended_deadline
                && shortfall.is_positive()
            {
                let days_left = extended_deadline.days_since(data.as_of);
                let mut result = Self::emit(
                    seller_id,
                    sync_id,
                    data,
                    claim,
                    AnomalyType::ExpiredClaimException,
                    shortfall,
                    EXCEPTION_RECOVERY_PROBABILITY,
                    format!(
                        "claim {} past the {}-day window but delay exception leaves {} days",
                        claim.case_id.as_str(),
                        STANDARD_WINDOW_DAYS,
                        days_left
                    ),
                    &[
                        "Refile citing the documented carrier/platform delay",
                        "Include delay documentation with exact dates",
                    ],
                )
                .with_deadline(extended_deadline, data.as_of);
                if days_left <= URGENT_DEADLINE_DAYS {
                    result = result.with_severity(
                        Severity::from_value(&shortfall).promote(),
                    );
                }
                results.push(result);
            }

            // Pending with no marketplace response for a week.
            if claim.status == ClaimStatus::Pending {
                let last_touch = claim.last_response_date.unwrap_or(claim.filed_date);
                let quiet_days = data.as_of.days_since(last_touch);
                if quiet_days >= STALE_PENDING_DAYS && shortfall.is_positive() {
                    results.push(Self::emit(
                        seller_id,
                        sync_id,
                        data,
                        claim,
                        AnomalyType::StalePendingClaim,
                        shortfall,
                        STALE_RECOVERY_PROBABILITY,
                        format!(
                            "claim {} pending with no response for {} days",
                            claim.case_id.as_str(),
                            quiet_days
                        ),
                        &[
                            "Post a follow-up on the open case",
                            "Request an expected resolution date",
                        ],
                    ));
                }
            }
        }

        gate_and_rank(results, self.min_value(), self.show_threshold())
    }
}
