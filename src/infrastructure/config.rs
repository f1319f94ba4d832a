//! Configuration infrastructure
//!
//! Loading and management of the harvester configuration: portal addresses
//! and selectors, credentials, download layout, settle timings, the retry
//! policy and logging. Everything lives in one JSON file under the platform
//! config directory; there are no CLI flags and no environment variables
//! (apart from the conventional `RUST_LOG` override honored by the logging
//! setup).

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Portal addresses, selectors and markers.
    pub portal: PortalConfig,

    /// Login credentials. Values are never logged.
    pub credentials: CredentialConfig,

    /// Download root and filename derivation settings.
    pub download: DownloadConfig,

    /// Settle intervals and bounded waits.
    pub timing: TimingConfig,

    /// Bounded-retry policy for downloads.
    pub retry: RetryConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Portal addresses plus the selectors and markers that drive the UI.
///
/// The portal recreates its controls on every filter change, so these are
/// lookup keys, not cached handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// WebDriver endpoint (e.g. a locally running chromedriver).
    pub webdriver_url: String,

    /// Login page URL.
    pub login_url: String,

    /// Tool page URL hosting the filter controls and result table.
    pub tool_url: String,

    /// `name` attribute of the username input.
    pub username_field: String,

    /// `name` attribute of the password input.
    pub password_field: String,

    /// XPath of the login submit button.
    pub login_button_xpath: String,

    /// `id` of the academic-year select control.
    pub year_select_id: String,

    /// `id` of the school/program select control.
    pub program_select_id: String,

    /// CSS selector for result-table rows.
    pub row_selector: String,

    /// Page-source marker signalling an explicit empty result set.
    pub no_data_marker: String,

    /// Zero-based index of the attachment column.
    pub attachment_column: usize,

    /// Rows with fewer cells are malformed or header rows and are skipped.
    pub min_row_cells: usize,
}

/// Login credentials from the external configuration collaborator.
///
/// `Debug` is implemented by hand so the secret values cannot leak through
/// log lines or error chains that format the surrounding config.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("username", &"***")
            .field("password", &"***")
            .finish()
    }
}

/// Download root and filename derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for the `<year>/<program>/<instructor>` layout.
    /// Relative paths resolve against the working directory.
    pub root_dir: PathBuf,

    /// Stem for synthesized fallback filenames.
    pub fallback_stem: String,

    /// Extension (without dot) for synthesized fallback filenames.
    pub default_extension: String,
}

/// Fixed settle intervals and bounded waits, in milliseconds.
///
/// The portal renders server-side after each selection; these intervals
/// match the observed repopulation behavior rather than any page signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Bounded wait for the filter controls at enumeration time.
    pub control_locate_timeout_ms: u64,

    /// Bounded wait when re-locating a control for a cell selection.
    pub reselect_timeout_ms: u64,

    /// Poll interval for bounded waits.
    pub poll_interval_ms: u64,

    /// Settle after submitting the login form.
    pub post_login_wait_ms: u64,

    /// Settle after navigating to the tool page.
    pub post_tool_wait_ms: u64,

    /// Settle after selecting a year.
    pub post_year_wait_ms: u64,

    /// Settle after selecting a program, while the table repopulates.
    pub post_program_wait_ms: u64,
}

/// Bounded-retry policy parameters for the download executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,

    /// Fixed backoff between attempts.
    pub backoff_ms: u64,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,

    /// Enable console output.
    pub console_output: bool,

    /// Enable file output.
    pub file_output: bool,

    /// Log file name inside the log directory.
    pub file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            credentials: CredentialConfig::default(),
            download: DownloadConfig::default(),
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            webdriver_url: defaults::WEBDRIVER_URL.to_string(),
            login_url: defaults::LOGIN_URL.to_string(),
            tool_url: defaults::TOOL_URL.to_string(),
            username_field: defaults::USERNAME_FIELD.to_string(),
            password_field: defaults::PASSWORD_FIELD.to_string(),
            login_button_xpath: defaults::LOGIN_BUTTON_XPATH.to_string(),
            year_select_id: defaults::YEAR_SELECT_ID.to_string(),
            program_select_id: defaults::PROGRAM_SELECT_ID.to_string(),
            row_selector: defaults::ROW_SELECTOR.to_string(),
            no_data_marker: defaults::NO_DATA_MARKER.to_string(),
            attachment_column: defaults::ATTACHMENT_COLUMN,
            min_row_cells: defaults::MIN_ROW_CELLS,
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(defaults::DOWNLOAD_ROOT),
            fallback_stem: defaults::FALLBACK_STEM.to_string(),
            default_extension: defaults::DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            control_locate_timeout_ms: defaults::CONTROL_LOCATE_TIMEOUT_MS,
            reselect_timeout_ms: defaults::RESELECT_TIMEOUT_MS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            post_login_wait_ms: defaults::POST_LOGIN_WAIT_MS,
            post_tool_wait_ms: defaults::POST_TOOL_WAIT_MS,
            post_year_wait_ms: defaults::POST_YEAR_WAIT_MS,
            post_program_wait_ms: defaults::POST_PROGRAM_WAIT_MS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            backoff_ms: defaults::RETRY_BACKOFF_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            console_output: true,
            file_output: true,
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

/// Default values, grouped so the `Default` impls stay declarative.
pub(crate) mod defaults {
    pub const WEBDRIVER_URL: &str = "http://localhost:9515";
    pub const LOGIN_URL: &str = "https://app.acadoinformatics.com/syllabus/department/login/";
    pub const TOOL_URL: &str = "https://app.acadoinformatics.com/syllabus/department/tools/MeritForms";

    pub const USERNAME_FIELD: &str = "username";
    pub const PASSWORD_FIELD: &str = "password";
    pub const LOGIN_BUTTON_XPATH: &str = "//button[contains(text(), 'Log In')]";
    pub const YEAR_SELECT_ID: &str = "select-year";
    pub const PROGRAM_SELECT_ID: &str = "select-program";
    pub const ROW_SELECTOR: &str = "table tbody tr";
    pub const NO_DATA_MARKER: &str = "No data available in table";
    pub const ATTACHMENT_COLUMN: usize = 3;
    pub const MIN_ROW_CELLS: usize = 4;

    pub const DOWNLOAD_ROOT: &str = "downloads";
    pub const FALLBACK_STEM: &str = "attachment";
    pub const DEFAULT_EXTENSION: &str = "pdf";

    pub const CONTROL_LOCATE_TIMEOUT_MS: u64 = 20_000;
    pub const RESELECT_TIMEOUT_MS: u64 = 10_000;
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const POST_LOGIN_WAIT_MS: u64 = 3_000;
    pub const POST_TOOL_WAIT_MS: u64 = 4_000;
    pub const POST_YEAR_WAIT_MS: u64 = 2_000;
    pub const POST_PROGRAM_WAIT_MS: u64 = 5_000;

    pub const RETRY_MAX_ATTEMPTS: u32 = 2;
    pub const RETRY_BACKOFF_MS: u64 = 2_000;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "harvest.log";
}

/// Configuration manager for loading and saving settings.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory.
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("cv-harvester");

        Ok(config_dir)
    }

    /// Create a new configuration manager with the platform default path.
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("harvester_config.json");

        Ok(Self { config_path })
    }

    /// Load configuration from file, creating a default one on first run.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Configuration file not found, creating default: {:?}",
                self.config_path
            );
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse configuration file")?;

        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    /// Save configuration to file, creating the directory as needed.
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        Ok(())
    }
}
