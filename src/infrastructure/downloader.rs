//! Download executor with dedup, bounded retry and all-or-nothing writes
//!
//! Deduplication is destination-path existence, nothing else: no content
//! hashes, no remote metadata. The filesystem under the download root is
//! append-only — an existing destination is never truncated or rewritten,
//! because its existence is what makes re-runs idempotent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{error, info, warn};

use crate::domain::record::{AttachmentTask, DownloadOutcome};
use crate::domain::services::FileFetcher;
use crate::infrastructure::config::RetryConfig;

/// Bounded-retry policy: a fixed number of attempts with a fixed backoff
/// between them, independent of the orchestration logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Raw transfer boundary. The executor owns retry, dedup and atomic
/// writes; the transport only moves bytes.
#[async_trait]
pub trait FileTransport: Send + Sync {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches resolved attachment tasks to disk.
pub struct DownloadExecutor {
    transport: Arc<dyn FileTransport>,
    retry: RetryPolicy,
}

impl DownloadExecutor {
    pub fn new(transport: Arc<dyn FileTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Transfer to a `.part` sibling and rename into place, so a failed
    /// transfer never leaves a file at the destination path.
    async fn try_transfer(&self, task: &AttachmentTask) -> Result<()> {
        let body = self.transport.get_bytes(&task.source_url).await?;

        let partial = partial_path(task);
        if let Err(e) = fs::write(&partial, &body).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e).with_context(|| format!("Failed to write {:?}", partial));
        }

        fs::rename(&partial, &task.destination)
            .await
            .with_context(|| format!("Failed to move {:?} into place", partial))?;

        Ok(())
    }
}

fn partial_path(task: &AttachmentTask) -> PathBuf {
    let mut name = task
        .destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    task.destination.with_file_name(name)
}

#[async_trait]
impl FileFetcher for DownloadExecutor {
    async fn fetch(&self, task: &AttachmentTask) -> DownloadOutcome {
        let file_name = task
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| task.destination.display().to_string());

        if task.destination.exists() {
            info!("   Skipping duplicate download: {}", file_name);
            return DownloadOutcome::SkippedDuplicate;
        }

        for attempt in 1..=self.retry.max_attempts {
            match self.try_transfer(task).await {
                Ok(()) => {
                    info!("   Downloaded {}", file_name);
                    return DownloadOutcome::Succeeded;
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(
                        "   Download failed for {} (attempt {}): {e:#}. Retrying...",
                        file_name, attempt
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    error!("   Final failure downloading {}: {e:#}", file_name);
                }
            }
        }

        DownloadOutcome::FailedAfterRetry
    }
}
