//! cv-harvester - batch retrieval of instructor CV attachments
//!
//! Drives an authenticated browser session across the full cross-product
//! of a portal's (academic year x school/program) filters, snapshots each
//! result table, and downloads every linked attachment exactly once into a
//! deterministic `<year>/<program>/<instructor>` folder layout.

pub mod application;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use anyhow::{Context, Result};
use thirtyfour::{DesiredCapabilities, WebDriver};
use tracing::{info, warn};

use crate::application::RunOrchestrator;
use crate::domain::record::RunSummary;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::downloader::{DownloadExecutor, RetryPolicy};
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
use crate::infrastructure::portal::PortalClient;
use crate::infrastructure::resolver::AttachmentResolver;

/// Run the harvest to completion.
///
/// The browser session is released on every exit path, including after a
/// critical failure.
pub async fn run(config: AppConfig) -> Result<RunSummary> {
    let caps = DesiredCapabilities::chrome();
    let driver = WebDriver::new(config.portal.webdriver_url.as_str(), caps)
        .await
        .context("Failed to connect to the WebDriver endpoint")?;

    let result = execute(driver.clone(), &config).await;

    info!("Shutting down browser session...");
    if let Err(e) = driver.quit().await {
        warn!("Failed to release browser session: {e}");
    }

    result
}

async fn execute(driver: WebDriver, config: &AppConfig) -> Result<RunSummary> {
    let portal = Arc::new(PortalClient::new(
        driver,
        config.portal.clone(),
        config.credentials.clone(),
        config.timing.clone(),
    ));
    let transport = Arc::new(HttpClient::new(HttpClientConfig::default())?);
    let fetcher = Arc::new(DownloadExecutor::new(
        transport,
        RetryPolicy::from_config(&config.retry),
    ));
    let resolver = AttachmentResolver::new(&config.download);

    let mut orchestrator = RunOrchestrator::new(portal, fetcher, resolver);
    orchestrator.run().await
}
