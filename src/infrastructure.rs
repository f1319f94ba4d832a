//! Infrastructure layer
//!
//! Concrete implementations of the domain service traits plus the ambient
//! concerns: configuration, logging, the WebDriver portal client, the
//! rate-limited HTTP transport, attachment resolution and the download
//! executor.

pub mod config;
pub mod downloader;
pub mod http_client;
pub mod logging;
pub mod portal;
pub mod resolver;

pub use config::{AppConfig, ConfigManager};
pub use downloader::{DownloadExecutor, RetryPolicy};
pub use http_client::{HttpClient, HttpClientConfig};
pub use portal::PortalClient;
pub use resolver::AttachmentResolver;
