//! Row snapshots, download tasks and run accounting
//!
//! `RowRecord` is an immutable snapshot of one result-table row, captured in
//! full before any download begins so nothing downstream depends on a live
//! DOM handle. `RunSummary` is the orchestrator's ledger of what happened,
//! logged at run end.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of one result-table row at extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// Instructor display name from the first cell, raw (pre-sanitization).
    pub instructor: String,
    /// Ordered cell texts, as read.
    pub cells: Vec<String>,
    /// Ordered attachment hrefs found in the designated attachment column.
    /// Anchors without an href are dropped during the snapshot.
    pub attachment_urls: Vec<String>,
}

impl RowRecord {
    pub fn has_attachments(&self) -> bool {
        !self.attachment_urls.is_empty()
    }
}

/// One resolved (source URL -> destination path) download unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTask {
    pub source_url: String,
    pub destination: PathBuf,
}

/// Terminal outcome of a single download task. Exactly one per task; never
/// raises past the row boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadOutcome {
    /// A file already exists at the resolved destination path.
    SkippedDuplicate,
    Succeeded,
    FailedAfterRetry,
}

/// Outcome of one grid cell, inspected by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    /// Rows were extracted and processed.
    Processed,
    /// The no-data marker was present, or extraction yielded zero rows.
    Empty,
}

/// Counters for the whole run, logged at teardown.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cells_total: usize,
    pub cells_processed: u32,
    pub cells_empty: u32,
    pub cells_failed: u32,
    pub rows_extracted: u32,
    pub rows_skipped: u32,
    pub downloads_succeeded: u32,
    pub downloads_skipped: u32,
    pub downloads_failed: u32,
}

impl RunSummary {
    pub fn new(run_id: String, cells_total: usize) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            cells_total,
            cells_processed: 0,
            cells_empty: 0,
            cells_failed: 0,
            rows_extracted: 0,
            rows_skipped: 0,
            downloads_succeeded: 0,
            downloads_skipped: 0,
            downloads_failed: 0,
        }
    }

    pub fn record_download(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Succeeded => self.downloads_succeeded += 1,
            DownloadOutcome::SkippedDuplicate => self.downloads_skipped += 1,
            DownloadOutcome::FailedAfterRetry => self.downloads_failed += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_downloads(&self) -> u32 {
        self.downloads_succeeded + self.downloads_skipped + self.downloads_failed
    }
}
