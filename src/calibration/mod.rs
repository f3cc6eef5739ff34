//! Confidence calibration against historical claim outcomes.
//!
//! Detectors report how sure their algorithm is; this module rewrites that
//! score using the historical approval rate of the anomaly type. Types that
//! under-perform get down-weighted proportionally to how much evidence
//! exists, and vice versa. A closed-form adjustment, not a trained model.

use crate::domain::{AnomalyType, AnomalyTypeAccuracy, OutcomeRecord};
use crate::store::{OutcomeStore, OutcomeUpdate, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Calibration needs at least this many resolved samples.
const MIN_SAMPLES: usize = 5;
/// Sample counts granting the medium/high interval labels.
const MEDIUM_INTERVAL_SAMPLES: usize = 20;
const HIGH_INTERVAL_SAMPLES: usize = 50;
/// Calibration factor clamp.
const FACTOR_MIN: f64 = 0.5;
const FACTOR_MAX: f64 = 1.5;
/// Sample count at which history carries full weight.
const FULL_WEIGHT_SAMPLES: f64 = 50.0;
/// Calibrated score clamp.
const CALIBRATED_MIN: f64 = 0.1;
const CALIBRATED_MAX: f64 = 0.99;

/// Default accuracy-cache TTL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// How much resolved history stands behind a calibrated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceInterval {
    Low,
    Medium,
    High,
}

impl ConfidenceInterval {
    fn from_samples(resolved: usize) -> Self {
        if resolved >= HIGH_INTERVAL_SAMPLES {
            ConfidenceInterval::High
        } else if resolved >= MEDIUM_INTERVAL_SAMPLES {
            ConfidenceInterval::Medium
        } else {
            ConfidenceInterval::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub anomaly_type: AnomalyType,
    pub raw_confidence: f64,
    pub calibrated_confidence: f64,
    pub interval: ConfidenceInterval,
    pub sample_size: usize,
    pub historical_approval_rate: Option<f64>,
}

/// Process-wide calibrator with a TTL'd accuracy cache.
///
/// Outcome writes invalidate the cache immediately; reads refresh it at most
/// once per TTL. Concurrent readers share the cached rollup; two concurrent
/// refreshes converge on the same value since the rollup is deterministic.
pub struct ConfidenceCalibrator {
    outcomes: Arc<dyn OutcomeStore>,
    ttl: Duration,
    cache: RwLock<HashMap<AnomalyType, (Instant, AnomalyTypeAccuracy)>>,
}

impl ConfidenceCalibrator {
    pub fn new(outcomes: Arc<dyn OutcomeStore>, ttl: Duration) -> Self {
        Self {
            outcomes,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached accuracy rollup for one anomaly type, refreshed past the TTL.
    /// A failing outcome store degrades to "no history" rather than erroring.
    async fn accuracy_for(&self, anomaly_type: AnomalyType) -> Option<AnomalyTypeAccuracy> {
        {
            let guard = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some((at, accuracy)) = guard.get(&anomaly_type) {
                if at.elapsed() < self.ttl {
                    return Some(accuracy.clone());
                }
            }
        }

        let records = match self.outcomes.fetch_outcomes(anomaly_type).await {
            Ok(records) => records,
            Err(e) => {
                warn!(anomaly_type = %anomaly_type, error = %e,
                    "outcome fetch failed; calibration degrades to raw");
                return None;
            }
        };
        let accuracy = AnomalyTypeAccuracy::from_records(anomaly_type, &records);

        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(anomaly_type, (Instant::now(), accuracy.clone()));
        Some(accuracy)
    }

    /// Calibrate a raw confidence score.
    pub async fn calibrate(&self, anomaly_type: AnomalyType, raw: f64) -> CalibrationResult {
        let accuracy = self.accuracy_for(anomaly_type).await;
        let resolved = accuracy
            .as_ref()
            .map(|a| a.resolved_samples())
            .unwrap_or(0);

        if resolved < MIN_SAMPLES {
            return CalibrationResult {
                anomaly_type,
                raw_confidence: raw,
                calibrated_confidence: raw,
                interval: ConfidenceInterval::Low,
                sample_size: resolved,
                historical_approval_rate: None,
            };
        }
        let accuracy = accuracy.expect("resolved samples imply accuracy");

        let safe_raw = raw.max(f64::EPSILON);
        let factor = (accuracy.approval_rate / safe_raw).clamp(FACTOR_MIN, FACTOR_MAX);
        let sample_weight = (resolved as f64 / FULL_WEIGHT_SAMPLES).min(1.0);
        let adjusted_factor = 1.0 + (factor - 1.0) * sample_weight;
        let calibrated = (raw * adjusted_factor).clamp(CALIBRATED_MIN, CALIBRATED_MAX);

        debug!(anomaly_type = %anomaly_type, raw, calibrated, resolved,
            approval_rate = accuracy.approval_rate, "confidence calibrated");

        CalibrationResult {
            anomaly_type,
            raw_confidence: raw,
            calibrated_confidence: calibrated,
            interval: ConfidenceInterval::from_samples(resolved),
            sample_size: resolved,
            historical_approval_rate: Some(accuracy.approval_rate),
        }
    }

    /// Record a new claim outcome; invalidates the type's cached rollup.
    pub async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StoreError> {
        self.outcomes.record_outcome(record).await?;
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(&record.anomaly_type);
        Ok(())
    }

    /// Apply a partial update to an existing outcome. The anomaly type is
    /// not known from the key alone, so the whole cache invalidates.
    pub async fn update_outcome(
        &self,
        detection_key: &str,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError> {
        self.outcomes.update_outcome(detection_key, update).await?;
        let mut guard = self.cache.write().unwrap_or_else(|e| e.into_inner());
        guard.clear();
        Ok(())
    }
}
