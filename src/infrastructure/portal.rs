//! WebDriver-backed portal client
//!
//! Implements `PortalDriver` on top of a live browser session: login and
//! session repair, filter enumeration, grid navigation and row snapshots.
//! The portal recreates its controls on every filter change and may
//! re-render the result table while it is being read, so element handles
//! are never reused across operations — every read goes through a fresh
//! lookup, and rows are captured into immutable records before anything
//! else happens.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thirtyfour::components::SelectElement;
use thirtyfour::error::WebDriverError;
use thirtyfour::extensions::query::ElementQueryable;
use thirtyfour::{By, WebDriver, WebElement};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::filter::{FilterDimensions, FilterValue, GridCell};
use crate::domain::record::RowRecord;
use crate::domain::services::PortalDriver;
use crate::infrastructure::config::{CredentialConfig, PortalConfig, TimingConfig};

pub struct PortalClient {
    driver: WebDriver,
    portal: PortalConfig,
    credentials: CredentialConfig,
    timing: TimingConfig,
}

impl PortalClient {
    pub fn new(
        driver: WebDriver,
        portal: PortalConfig,
        credentials: CredentialConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            driver,
            portal,
            credentials,
            timing,
        }
    }

    /// Fixed settle interval; the portal renders server-side with no
    /// reliable completion signal to wait on.
    async fn settle(&self, ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    /// Locate a filter control with a bounded wait, always returning a
    /// fresh handle.
    async fn locate_control(&self, id: &str, timeout_ms: u64) -> Result<WebElement> {
        self.driver
            .query(By::Id(id))
            .wait(
                Duration::from_millis(timeout_ms),
                Duration::from_millis(self.timing.poll_interval_ms),
            )
            .first()
            .await
            .with_context(|| format!("Filter control '#{id}' did not appear within {timeout_ms}ms"))
    }

    async fn collect_options(&self, control: &WebElement) -> Result<Vec<FilterValue>> {
        let select = SelectElement::new(control).await?;
        let mut values = Vec::new();
        for option in select.options().await? {
            let value = option.attr("value").await?.unwrap_or_default();
            let text = option.text().await?.trim().to_string();
            let candidate = FilterValue::new(text, value);
            // Placeholder ("select one") options carry an empty value.
            if !candidate.is_placeholder() {
                values.push(candidate);
            }
        }
        Ok(values)
    }

    async fn submit_credentials(&self) -> Result<()> {
        self.driver
            .find(By::Name(self.portal.username_field.as_str()))
            .await?
            .send_keys(self.credentials.username.as_str())
            .await?;
        self.driver
            .find(By::Name(self.portal.password_field.as_str()))
            .await?
            .send_keys(self.credentials.password.as_str())
            .await?;
        self.driver
            .find(By::XPath(self.portal.login_button_xpath.as_str()))
            .await?
            .click()
            .await?;
        Ok(())
    }

    /// Probe for the login form; if present, log back in and return to the
    /// tool page.
    async fn repair_session(&self) -> Result<()> {
        let login_fields = self
            .driver
            .find_all(By::Name(self.portal.username_field.as_str()))
            .await?;
        if login_fields.is_empty() {
            return Ok(());
        }

        warn!("Session expired. Logging in again...");
        self.submit_credentials().await?;
        self.settle(self.timing.post_login_wait_ms).await;

        let current = self.driver.current_url().await?;
        if !current.as_str().starts_with(&self.portal.tool_url) {
            self.driver.goto(&self.portal.tool_url).await?;
            self.settle(self.timing.post_tool_wait_ms).await;
        }
        Ok(())
    }

    async fn read_row(&self, row: &WebElement) -> Result<Option<RowRecord>, WebDriverError> {
        let cells = row.find_all(By::Tag("td")).await?;
        // Header or malformed rows carry fewer cells than a data row.
        if cells.len() < self.portal.min_row_cells {
            return Ok(None);
        }

        let mut texts = Vec::with_capacity(cells.len());
        for cell in &cells {
            texts.push(cell.text().await?.trim().to_string());
        }
        let instructor = texts[0].clone();

        let anchors = cells[self.portal.attachment_column]
            .find_all(By::Tag("a"))
            .await?;
        let mut hrefs = Vec::new();
        for anchor in &anchors {
            match anchor.attr("href").await? {
                Some(href) if !href.is_empty() => hrefs.push(href),
                _ => debug!("Anchor without href in attachment cell, not downloadable"),
            }
        }

        Ok(Some(RowRecord {
            instructor,
            cells: texts,
            attachment_urls: hrefs,
        }))
    }
}

#[async_trait]
impl PortalDriver for PortalClient {
    async fn login(&self) -> Result<()> {
        info!("Navigating to login page");
        self.driver.goto(&self.portal.login_url).await?;

        self.driver
            .query(By::Name(self.portal.username_field.as_str()))
            .wait(
                Duration::from_millis(self.timing.control_locate_timeout_ms),
                Duration::from_millis(self.timing.poll_interval_ms),
            )
            .first()
            .await
            .context("Login form did not appear")?;

        self.submit_credentials().await?;
        self.settle(self.timing.post_login_wait_ms).await;

        info!("Navigating to the merit review tool");
        self.driver.goto(&self.portal.tool_url).await?;
        self.settle(self.timing.post_tool_wait_ms).await;
        Ok(())
    }

    async fn ensure_authenticated(&self) {
        if let Err(e) = self.repair_session().await {
            warn!("Error checking login state: {e:#}");
        }
    }

    async fn enumerate_filters(&self) -> Result<FilterDimensions> {
        let year_control = self
            .locate_control(
                &self.portal.year_select_id,
                self.timing.control_locate_timeout_ms,
            )
            .await?;
        let years = self.collect_options(&year_control).await?;

        let program_control = self
            .locate_control(
                &self.portal.program_select_id,
                self.timing.control_locate_timeout_ms,
            )
            .await?;
        let programs = self.collect_options(&program_control).await?;

        Ok(FilterDimensions { years, programs })
    }

    async fn select_cell(&self, cell: &GridCell) -> Result<()> {
        let year_control = self
            .locate_control(&self.portal.year_select_id, self.timing.reselect_timeout_ms)
            .await?;
        SelectElement::new(&year_control)
            .await?
            .select_by_exact_text(&cell.year.text)
            .await
            .with_context(|| format!("Could not select year '{}'", cell.year.text))?;
        self.settle(self.timing.post_year_wait_ms).await;

        let program_control = self
            .locate_control(
                &self.portal.program_select_id,
                self.timing.reselect_timeout_ms,
            )
            .await?;
        SelectElement::new(&program_control)
            .await?
            .select_by_exact_text(&cell.program.text)
            .await
            .with_context(|| format!("Could not select program '{}'", cell.program.text))?;
        // Longer settle here: the result table repopulates server-side.
        self.settle(self.timing.post_program_wait_ms).await;

        Ok(())
    }

    async fn has_no_data(&self) -> Result<bool> {
        let source = self.driver.source().await?;
        Ok(source.contains(&self.portal.no_data_marker))
    }

    async fn extract_rows(&self) -> Result<Vec<RowRecord>> {
        let initial = self
            .driver
            .find_all(By::Css(self.portal.row_selector.as_str()))
            .await?;
        let total = initial.len();

        let mut records = Vec::with_capacity(total);
        for index in 0..total {
            // Re-fetch the live collection before each read; the table can
            // re-render out from under an in-progress scan.
            let live = self
                .driver
                .find_all(By::Css(self.portal.row_selector.as_str()))
                .await?;
            let Some(row) = live.get(index) else {
                warn!(
                    "Result table shrank to {} rows mid-extraction, stopping at row {}",
                    live.len(),
                    index
                );
                break;
            };

            match self.read_row(row).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!("Skipping malformed row {index}"),
                Err(WebDriverError::StaleElementReference(_)) => {
                    warn!("Stale element during row parsing. Skipping row {index}.");
                }
                Err(e) => {
                    warn!("Error reading row {index}: {e}. Skipping row.");
                }
            }
        }

        Ok(records)
    }

    async fn reset_to_tool_page(&self) {
        if let Err(e) = self.driver.goto(&self.portal.tool_url).await {
            warn!("Failed to reset navigator to tool page: {e}");
        }
        self.settle(self.timing.post_tool_wait_ms).await;
    }
}
