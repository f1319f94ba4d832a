//! Attachment link resolution and destination layout
//!
//! Maps a row's discovered links onto the deterministic
//! `<root>/<year>/<program>/<instructor>/<filename>` layout. The resolved
//! path is a pure function of (cell, instructor, URL, link ordinal), so
//! re-running against unchanged portal state resolves the same logical
//! file to the same path — which is what makes path-existence
//! deduplication sound.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use url::Url;

use crate::domain::filter::GridCell;
use crate::domain::record::{AttachmentTask, RowRecord};
use crate::domain::sanitize::{sanitize_filename, sanitize_segment};
use crate::infrastructure::config::DownloadConfig;

/// Fallback directory segment when a portal value sanitizes to nothing.
const UNNAMED_SEGMENT: &str = "unnamed";

pub struct AttachmentResolver {
    root: PathBuf,
    fallback_stem: String,
    default_extension: String,
}

impl AttachmentResolver {
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            fallback_stem: config.fallback_stem.clone(),
            default_extension: config.default_extension.clone(),
        }
    }

    /// Resolve every link of a row into download tasks, creating the
    /// instructor directory when at least one link resolves. A row whose
    /// links all fail to resolve creates no directory.
    pub async fn resolve_row(
        &self,
        cell: &GridCell,
        row: &RowRecord,
    ) -> Result<Vec<AttachmentTask>> {
        let dir = self.instructor_dir(cell, &row.instructor);

        let tasks: Vec<AttachmentTask> = row
            .attachment_urls
            .iter()
            .enumerate()
            .map(|(ordinal, href)| AttachmentTask {
                source_url: href.clone(),
                destination: dir.join(self.derive_filename(href, ordinal)),
            })
            .collect();

        if !tasks.is_empty() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory {dir:?}"))?;
        }

        Ok(tasks)
    }

    fn instructor_dir(&self, cell: &GridCell, instructor: &str) -> PathBuf {
        self.root
            .join(sanitize_segment(&cell.year.text, UNNAMED_SEGMENT))
            .join(sanitize_segment(&cell.program.text, UNNAMED_SEGMENT))
            .join(sanitize_segment(instructor, UNNAMED_SEGMENT))
    }

    /// Filename from the URL's path component. An empty or extension-less
    /// name gets a synthesized one; the ordinal is scoped to the row, so
    /// several extension-less links in one row never collide.
    fn derive_filename(&self, href: &str, ordinal: usize) -> String {
        let from_url = Url::parse(href)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|segments| segments.last().map(str::to_string))
            })
            .unwrap_or_default();

        let name = sanitize_filename(&from_url);
        if name.is_empty() || !name.contains('.') {
            format!(
                "{}_{:02}.{}",
                self.fallback_stem,
                ordinal + 1,
                self.default_extension
            )
        } else {
            name
        }
    }
}
