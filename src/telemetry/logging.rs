//! Logging configuration and initialization
//!
//! Console output in compact or JSON form, plus an optional log file
//! written through a non-blocking appender.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::settings::AppPreferences;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "IMPAIRMENT_LOG";
/// Environment variable selecting the output format (`json`)
pub const LOG_FORMAT_ENV: &str = "IMPAIRMENT_LOG_FORMAT";

/// Log file used when file logging is on and no path is configured
const DEFAULT_LOG_FILE: &str = "impairment-sim.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Path for the log file (default: `impairment-sim.log`)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for console logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Logging settings saved in the user's preferences
    pub fn from_preferences(prefs: &AppPreferences) -> Self {
        Self {
            file_enabled: prefs.log_to_file,
            file_path: prefs.log_file.as_ref().map(PathBuf::from),
            json_format: prefs.log_json,
            default_level: prefs.log_level.clone(),
            ..Self::default()
        }
    }

    /// Whether JSON output is selected, by environment or by config
    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so the log file is flushed.
///
/// # Environment Variables
///
/// - `IMPAIRMENT_LOG`: Log filter (e.g. "debug", "info,impairment_sim=trace"),
///   checked before `RUST_LOG`
/// - `IMPAIRMENT_LOG_FORMAT`: Set to "json" for JSON output
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = config.use_json();
    let mut file_guard: Option<WorkerGuard> = None;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.file_enabled {
        let log_path = config
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        let file = std::fs::File::create(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        if config.console_enabled {
            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact();
            subscriber.with(file_layer).with(console_layer).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }

        eprintln!("Logging to file: {}", log_path.display());
    } else if config.console_enabled {
        if use_json {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            subscriber.with(json_layer).try_init()?;
        } else {
            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact();
            subscriber.with(console_layer).try_init()?;
        }
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        target: "impairment_sim",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

// Re-export WorkerGuard so callers can store it
pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;
