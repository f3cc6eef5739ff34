//! Production wiring: config to a ready DetectionRunner, and the
//! all-sellers batch loop the scheduler entry point drives.

use super::{DetectionRunner, RunSummary};
use crate::calibration::{ConfidenceCalibrator, DEFAULT_CACHE_TTL};
use crate::config::Config;
use crate::domain::{Currency, SellerId};
use crate::error::AppError;
use crate::store::{init_db, JsonFileEventStore, Repository};
use crate::valuation::{
    ClaimValueCalculator, CostCache, FxConverter, HttpRateSource, LiveRateSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Cost resolutions stay warm for this long within a process.
const COST_CACHE_TTL: Duration = Duration::from_secs(300);

/// Build a runner from configuration: sqlite-backed sink/outcomes/rates,
/// JSON-export event store, optional live FX tier.
pub async fn build_runner(config: &Config) -> Result<DetectionRunner, AppError> {
    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let live_source = config
        .fx_api_url
        .clone()
        .map(|url| Arc::new(HttpRateSource::new(url)) as Arc<dyn LiveRateSource>);
    let fx = Arc::new(FxConverter::new(
        Some(repo.clone()),
        live_source,
        Duration::from_millis(config.fx_timeout_ms),
    ));

    let calculator = Arc::new(ClaimValueCalculator::new(
        Arc::new(CostCache::new(COST_CACHE_TTL)),
        fx,
    ));

    let calibration_ttl = if config.calibration_ttl_secs == 0 {
        DEFAULT_CACHE_TTL
    } else {
        Duration::from_secs(config.calibration_ttl_secs)
    };
    let calibrator = Arc::new(ConfidenceCalibrator::new(repo.clone(), calibration_ttl));

    let event_store = Arc::new(JsonFileEventStore::new(
        PathBuf::from(&config.events_dir),
        config.invoice_dir.as_ref().map(PathBuf::from),
    ));

    Ok(DetectionRunner::new(
        event_store,
        repo,
        calibrator,
        calculator,
        config.lookback_days,
        Currency::new(config.target_currency.clone()),
    ))
}

/// Run detection for every configured seller, returning the summaries.
pub async fn run_all_sellers(config: &Config) -> Result<Vec<RunSummary>, AppError> {
    if config.sellers.is_empty() {
        return Err(AppError::Internal(
            "no sellers configured; set SELLERS or SELLERS_FILE".to_string(),
        ));
    }

    let runner = build_runner(config).await?;
    let mut summaries = Vec::with_capacity(config.sellers.len());
    for seller in &config.sellers {
        summaries.push(runner.run_for_seller(&SellerId::new(seller.clone())).await);
    }
    Ok(summaries)
}
