//! Single run-to-completion batch entry point.

use std::process::ExitCode;

use anyhow::Result;
use tracing::{error, info};

use cv_harvester::infrastructure::config::ConfigManager;
use cv_harvester::infrastructure::logging;

#[tokio::main]
async fn main() -> ExitCode {
    match harvest().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Critical execution error: {e:#}");
            eprintln!("cv-harvester failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn harvest() -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load_config().await?;
    logging::init_logging(&config.logging)?;

    info!("Starting harvest...");
    let summary = cv_harvester::run(config).await?;
    info!(
        "Harvest complete: {} files downloaded, {} duplicates skipped, {} failed.",
        summary.downloads_succeeded, summary.downloads_skipped, summary.downloads_failed
    );
    Ok(())
}
