//! Service layer traits for the harvest pipeline
//!
//! The orchestrator is written against these seams so the traversal and
//! failure-isolation logic can be exercised without a live portal. The
//! WebDriver-backed implementation lives in `infrastructure::portal`; the
//! HTTP-backed fetcher in `infrastructure::downloader`.

use anyhow::Result;
use async_trait::async_trait;

use super::filter::{FilterDimensions, GridCell};
use super::record::{AttachmentTask, DownloadOutcome, RowRecord};

/// Portal-facing operations, in the order the orchestrator drives them.
///
/// Error semantics follow the containment policy: `login` and
/// `enumerate_filters` errors abort the run, `select_cell`/`has_no_data`/
/// `extract_rows` errors abandon the current cell, and the two repair
/// operations are best-effort and never propagate.
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Initial authentication: navigate to the login page, submit
    /// credentials, then move to the tool page.
    async fn login(&self) -> Result<()>;

    /// Probe for an expired session and repair it in place. Idempotent and
    /// safe to call before every cell; failures are logged, never raised.
    async fn ensure_authenticated(&self);

    /// Read the full set of selectable values for both filter dimensions.
    /// Failure here is the single unrecoverable precondition: without
    /// filter values there is no traversal space.
    async fn enumerate_filters(&self) -> Result<FilterDimensions>;

    /// Drive both filter controls to the given cell and wait for the
    /// result table to settle.
    async fn select_cell(&self, cell: &GridCell) -> Result<()>;

    /// True if the page signals the explicit empty-result marker.
    async fn has_no_data(&self) -> Result<bool>;

    /// Snapshot the current result table. Tolerates concurrent DOM
    /// mutation: a shrinking row collection ends extraction early, a
    /// malformed or stale row is skipped.
    async fn extract_rows(&self) -> Result<Vec<RowRecord>>;

    /// Return to the tool page after a cell-level failure, so the next
    /// cell starts from a known navigation state. Best-effort.
    async fn reset_to_tool_page(&self);
}

/// Fetches one resolved attachment task to disk.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Always resolves to exactly one outcome; never raises past the task
    /// boundary.
    async fn fetch(&self, task: &AttachmentTask) -> DownloadOutcome;
}
