//! Run orchestration and failure isolation
//!
//! Sequences the whole pipeline across the filter grid. Failures are
//! contained at the narrowest boundary that can keep making forward
//! progress: a task failure never stops its row, a row failure never stops
//! its cell, a cell failure never stops the run. Only login failure and an
//! empty traversal space abort.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::filter::GridCell;
use crate::domain::record::{CellOutcome, RowRecord, RunSummary};
use crate::domain::services::{FileFetcher, PortalDriver};
use crate::infrastructure::resolver::AttachmentResolver;

/// Lifecycle of one harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    LoggedIn,
    IteratingCells,
    Done,
    CriticalFailure,
}

/// Owns the portal session for the run's lifetime and drives every cell
/// through the same isolation boundary.
pub struct RunOrchestrator {
    portal: Arc<dyn PortalDriver>,
    fetcher: Arc<dyn FileFetcher>,
    resolver: AttachmentResolver,
    state: RunState,
}

impl RunOrchestrator {
    pub fn new(
        portal: Arc<dyn PortalDriver>,
        fetcher: Arc<dyn FileFetcher>,
        resolver: AttachmentResolver,
    ) -> Self {
        Self {
            portal,
            fetcher,
            resolver,
            state: RunState::Starting,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the full grid. A returned error is reserved for the
    /// run-aborting conditions (login failure, no traversal space); every
    /// other failure is contained and tallied in the summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        info!("Starting harvest run {run_id}");

        if let Err(e) = self.portal.login().await {
            self.state = RunState::CriticalFailure;
            return Err(e).context("Initial login failed");
        }
        self.state = RunState::LoggedIn;

        let dimensions = match self.portal.enumerate_filters().await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                self.state = RunState::CriticalFailure;
                return Err(e).context("Filter controls not found; no traversal space to iterate");
            }
        };
        info!(
            "Found {} years and {} schools/programs.",
            dimensions.years.len(),
            dimensions.programs.len()
        );

        let mut summary = RunSummary::new(run_id, dimensions.cell_count());
        self.state = RunState::IteratingCells;

        for cell in dimensions.cells() {
            info!(
                "== Processing school: {}, year: {} ==",
                cell.program.text, cell.year.text
            );
            match self.process_cell(&cell, &mut summary).await {
                Ok(CellOutcome::Processed) => summary.cells_processed += 1,
                Ok(CellOutcome::Empty) => summary.cells_empty += 1,
                Err(e) => {
                    error!("Error processing {}: {e:#}", cell.label());
                    summary.cells_failed += 1;
                    // A failure mid-cell can leave the page in an
                    // inconsistent navigation state; reset before the next
                    // cell's selection.
                    self.portal.reset_to_tool_page().await;
                }
            }
        }

        self.state = RunState::Done;
        summary.finish();
        info!(
            "Run {} finished: {} cells processed, {} empty, {} failed; downloads: {} new, {} duplicates skipped, {} failed",
            summary.run_id,
            summary.cells_processed,
            summary.cells_empty,
            summary.cells_failed,
            summary.downloads_succeeded,
            summary.downloads_skipped,
            summary.downloads_failed
        );
        Ok(summary)
    }

    /// One grid cell inside its isolation boundary: any error here abandons
    /// the cell and is handled by the caller.
    async fn process_cell(&self, cell: &GridCell, summary: &mut RunSummary) -> Result<CellOutcome> {
        self.portal.ensure_authenticated().await;
        self.portal.select_cell(cell).await?;

        if self.portal.has_no_data().await? {
            info!("   -> No data found.");
            return Ok(CellOutcome::Empty);
        }

        let rows = self.portal.extract_rows().await?;
        if rows.is_empty() {
            info!("   -> No rows found.");
            return Ok(CellOutcome::Empty);
        }

        info!("   -> Found {} potential instructors.", rows.len());
        summary.rows_extracted += rows.len() as u32;

        for row in &rows {
            if let Err(e) = self.process_row(cell, row, summary).await {
                error!(
                    "   Error processing instructor row '{}': {e:#}",
                    row.instructor
                );
                summary.rows_skipped += 1;
            }
        }

        Ok(CellOutcome::Processed)
    }

    /// One row inside its isolation boundary. The fetcher itself never
    /// errors — it resolves every task to exactly one outcome.
    async fn process_row(
        &self,
        cell: &GridCell,
        row: &RowRecord,
        summary: &mut RunSummary,
    ) -> Result<()> {
        if !row.has_attachments() {
            info!("   Skipping {}: no file or link found.", row.instructor);
            summary.rows_skipped += 1;
            return Ok(());
        }

        let tasks = self.resolver.resolve_row(cell, row).await?;
        for task in &tasks {
            let outcome = self.fetcher.fetch(task).await;
            summary.record_download(outcome);
        }
        Ok(())
    }
}
