pub mod calibration;
pub mod config;
pub mod detectors;
pub mod domain;
pub mod error;
pub mod orchestration;
pub mod store;
pub mod valuation;

pub use calibration::{CalibrationResult, ConfidenceCalibrator, ConfidenceInterval};
pub use config::Config;
pub use detectors::{registry, DetectionDataset, Detector, WriteMode};
pub use domain::{
    AnomalyType, ClaimValuation, Currency, Decimal, DetectionResult, Evidence, SellerId,
    Severity, Sku, SyncId, TimeMs,
};
pub use error::AppError;
pub use orchestration::{DetectionRunner, RunSummary};
pub use store::{init_db, EventStore, OutcomeStore, RateStore, Repository, ResultSink};
pub use valuation::{ClaimValueCalculator, CostCache, FxConverter};
