//! Detection run orchestration.
//!
//! One run per seller per sync batch: fetch every event collection (each
//! failure degrades to an empty collection), fan the detector registry out
//! across blocking tasks, calibrate each result's confidence against
//! historical outcomes, value cost-based detections through the claim value
//! calculator, convert currencies, and write to the sink with per-result
//! error swallowing.

use crate::calibration::ConfidenceCalibrator;
use crate::detectors::{registry, DetectionDataset, WriteMode};
use crate::domain::{Currency, DetectionResult, SellerId, SyncId, TimeMs};
use crate::store::{fetch_dataset_lossy, EventStore, ResultSink};
use crate::valuation::ClaimValueCalculator;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one detection run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub seller_id: SellerId,
    pub sync_id: SyncId,
    pub detectors_run: usize,
    pub results_emitted: usize,
    pub results_written: usize,
    /// (detector name, results emitted) per detector.
    pub per_detector: Vec<(&'static str, usize)>,
}

pub struct DetectionRunner {
    event_store: Arc<dyn EventStore>,
    sink: Arc<dyn ResultSink>,
    calibrator: Arc<ConfidenceCalibrator>,
    calculator: Arc<ClaimValueCalculator>,
    lookback_days: i64,
    target_currency: Currency,
}

impl DetectionRunner {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        sink: Arc<dyn ResultSink>,
        calibrator: Arc<ConfidenceCalibrator>,
        calculator: Arc<ClaimValueCalculator>,
        lookback_days: i64,
        target_currency: Currency,
    ) -> Self {
        Self {
            event_store,
            sink,
            calibrator,
            calculator,
            lookback_days,
            target_currency,
        }
    }

    /// Run a fresh detection batch for one seller.
    pub async fn run_for_seller(&self, seller_id: &SellerId) -> RunSummary {
        let sync_id = SyncId::generate();
        self.run_batch(seller_id, &sync_id, TimeMs::now()).await
    }

    /// Run a detection batch with explicit sync id and reference time.
    /// Rerunning with identical ids over identical data converges on the
    /// same persisted rows.
    pub async fn run_batch(
        &self,
        seller_id: &SellerId,
        sync_id: &SyncId,
        as_of: TimeMs,
    ) -> RunSummary {
        info!(seller = %seller_id, sync = %sync_id, "starting detection run");

        let data = Arc::new(
            fetch_dataset_lossy(
                self.event_store.as_ref(),
                seller_id,
                self.lookback_days,
                as_of,
            )
            .await,
        );

        // Detectors are pure CPU and share nothing; run them all in
        // parallel on the blocking pool.
        let detectors = registry();
        let detectors_run = detectors.len();
        let handles: Vec<_> = detectors
            .into_iter()
            .map(|detector| {
                let name = detector.name();
                let write_mode = detector.write_mode();
                let data = Arc::clone(&data);
                let seller = seller_id.clone();
                let sync = sync_id.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    detector.detect(&seller, &sync, &data)
                });
                (name, write_mode, handle)
            })
            .collect();

        let mut per_detector = Vec::with_capacity(detectors_run);
        let mut insert_batch = Vec::new();
        let mut upsert_batch = Vec::new();
        for (name, write_mode, handle) in handles {
            let results = match handle.await {
                Ok(results) => results,
                Err(e) => {
                    warn!(detector = name, error = %e, "detector task failed; skipping");
                    Vec::new()
                }
            };
            per_detector.push((name, results.len()));
            match write_mode {
                WriteMode::BatchInsert => insert_batch.extend(results),
                WriteMode::UpsertByBatch => upsert_batch.extend(results),
            }
        }
        let results_emitted = insert_batch.len() + upsert_batch.len();

        let insert_batch = self.postprocess(seller_id, insert_batch, &data).await;
        let upsert_batch = self.postprocess(seller_id, upsert_batch, &data).await;

        let mut results_written = self.write_inserts(&insert_batch).await;
        results_written += self.write_upserts(&upsert_batch).await;

        let summary = RunSummary {
            seller_id: seller_id.clone(),
            sync_id: sync_id.clone(),
            detectors_run,
            results_emitted,
            results_written,
            per_detector,
        };
        info!(seller = %seller_id, sync = %sync_id,
            emitted = results_emitted, written = results_written,
            "detection run complete");
        summary
    }

    /// Calibrate confidence, value cost-based detections, and convert
    /// currencies. Raw scores stay in evidence for auditability.
    async fn postprocess(
        &self,
        seller_id: &SellerId,
        results: Vec<DetectionResult>,
        data: &DetectionDataset,
    ) -> Vec<DetectionResult> {
        let mut processed = Vec::with_capacity(results.len());

        for mut result in results {
            let calibration = self
                .calibrator
                .calibrate(result.anomaly_type, result.confidence)
                .await;
            result.evidence.fields.insert(
                "raw_confidence".to_string(),
                serde_json::json!(calibration.raw_confidence),
            );
            result.evidence.fields.insert(
                "confidence_interval".to_string(),
                serde_json::json!(calibration.interval),
            );
            result.evidence.fields.insert(
                "calibration_samples".to_string(),
                serde_json::json!(calibration.sample_size),
            );
            result.confidence = calibration.calibrated_confidence;

            if let Some(facts) = result.claim_facts.clone() {
                let valuation = self
                    .calculator
                    .calculate(
                        seller_id,
                        &result.detection_key,
                        &facts,
                        &self.target_currency,
                        data,
                    )
                    .await;
                result.evidence.fields.insert(
                    "valuation".to_string(),
                    serde_json::json!({
                        "unit_cost": valuation.unit_cost,
                        "cost_source": valuation.cost_source.as_str(),
                        "detector_estimate": result.estimated_value,
                        "method_notes": valuation.method_notes,
                    }),
                );
                // The cost-based figure is the defensible claim amount.
                result.estimated_value = valuation.converted_value;
                result.currency = self.target_currency.clone();
            } else if result.currency != self.target_currency {
                let rate = self
                    .calculator
                    .convert(&result.currency, &self.target_currency, result.discovery_date)
                    .await;
                result.evidence.fields.insert(
                    "currency_conversion".to_string(),
                    serde_json::json!({
                        "original_value": result.estimated_value,
                        "original_currency": result.currency.as_str(),
                        "exchange_rate": rate.rate,
                        "rate_source": rate.source.as_str(),
                    }),
                );
                result.estimated_value = (result.estimated_value * rate.rate).round_cents();
                result.currency = self.target_currency.clone();
            }

            processed.push(result);
        }
        processed
    }

    /// Batch insert; on batch failure fall back to per-result writes so one
    /// bad row never blocks its siblings.
    async fn write_inserts(&self, results: &[DetectionResult]) -> usize {
        if results.is_empty() {
            return 0;
        }
        match self.sink.insert_results(results).await {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "batch insert failed; retrying per result");
                let mut written = 0;
                for result in results {
                    match self.sink.insert_results(std::slice::from_ref(result)).await {
                        Ok(n) => written += n,
                        Err(e) => {
                            warn!(detection_key = %result.detection_key, error = %e,
                                "dropping result after failed write");
                        }
                    }
                }
                written
            }
        }
    }

    /// Per-result upserts keyed on (seller, sync, anomaly type) for the
    /// refund-trap class; failures are logged and swallowed.
    async fn write_upserts(&self, results: &[DetectionResult]) -> usize {
        let writes = join_all(results.iter().map(|result| async move {
            match self.sink.upsert_result(result).await {
                Ok(()) => 1usize,
                Err(e) => {
                    warn!(detection_key = %result.detection_key, error = %e,
                        "dropping result after failed upsert");
                    0
                }
            }
        }))
        .await;
        writes.into_iter().sum()
    }
}
