//! Domain model for the harvest pipeline
//!
//! Value types for the traversal grid and extracted rows, plus the service
//! traits the orchestrator is written against.

pub mod filter;
pub mod record;
pub mod sanitize;
pub mod services;

pub use filter::{FilterDimensions, FilterValue, GridCell};
pub use record::{AttachmentTask, DownloadOutcome, RowRecord, RunSummary};
pub use services::{FileFetcher, PortalDriver};
