use anyhow::Context;
use recoup::config::Config;
use recoup::orchestration::run_all_sellers;

/// Batch entry point: an external scheduler invokes this per refresh cycle;
/// it runs detection for every configured seller and exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let summaries = run_all_sellers(&config)
        .await
        .context("running detection")?;

    for summary in &summaries {
        tracing::info!(
            seller = %summary.seller_id,
            sync = %summary.sync_id,
            emitted = summary.results_emitted,
            written = summary.results_written,
            "seller run finished"
        );
        for (detector, count) in &summary.per_detector {
            tracing::info!(seller = %summary.seller_id, detector, count, "detector results");
        }
    }

    Ok(())
}
