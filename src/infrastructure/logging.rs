//! Logging system configuration and initialization
//!
//! Progress, warning and error lines go to a persistent log file and the
//! live console simultaneously. Log content is advisory, not a
//! machine-readable contract.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the log file writer alive for the whole run.
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Local-time formatter matching the log lines the portal operators read.
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Get the log directory relative to the executable location.
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize logging with the given configuration.
///
/// The filter suppresses verbose dependency output (`reqwest`, `hyper`,
/// `thirtyfour` wire traffic) below the application level; `RUST_LOG`
/// overrides everything when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(&config.level)
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("h2=warn".parse().unwrap())
            .add_directive("thirtyfour=info".parse().unwrap())
            .add_directive("tokio=info".parse().unwrap())
    });

    let registry = Registry::default().with(env_filter);

    match (config.file_output, config.console_output) {
        (true, true) => {
            let (file_writer, file_guard) = file_writer(&config.file_name)?;
            LOG_GUARDS.lock().unwrap().push(file_guard);

            let file_layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false);
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false);

            registry.with(file_layer).with(console_layer).init();
        }
        (true, false) => {
            let (file_writer, file_guard) = file_writer(&config.file_name)?;
            LOG_GUARDS.lock().unwrap().push(file_guard);

            let file_layer = fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false);

            registry.with(file_layer).init();
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false);

            registry.with(console_layer).init();
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);

    Ok(())
}

fn file_writer(
    file_name: &str,
) -> Result<(
    non_blocking::NonBlocking,
    non_blocking::WorkerGuard,
)> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

    let file_appender = rolling::never(&log_dir, file_name);
    Ok(non_blocking(file_appender))
}
