//! Tracing setup for Audiogate tools
//!
//! Console output follows the user's chosen level. When a logs directory is
//! given, a second layer writes the full trace of the run to disk.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the per-run trace log, overwritten on every run.
pub const RUN_LOG_FILE: &str = "audiogate-last-run.log";

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("Cannot prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `console_level` for the console layer. With
/// `logs_dir`, everything down to TRACE is also written to
/// `logs_dir/audiogate-last-run.log`; the path is returned.
///
/// # Errors
///
/// - `TracingSetupError::LogFile` - The logs directory or file cannot be created
/// - `TracingSetupError::AlreadyInstalled` - A global subscriber already exists
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<Option<PathBuf>, TracingSetupError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let Some(logs_dir) = logs_dir else {
        tracing_subscriber::registry().with(console_layer).try_init()?;
        return Ok(None);
    };

    let log_file_path = logs_dir.join(RUN_LOG_FILE);
    let log_file = create_dir_all(logs_dir)
        .and_then(|_| File::create(&log_file_path))
        .map_err(|source| TracingSetupError::LogFile {
            path: log_file_path.clone(),
            source,
        })?;

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(log_file = %log_file_path.display(), "Tracing initialized");

    Ok(Some(log_file_path))
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    #[default]
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use audiogate_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_tracing() {
        assert_eq!(CliLogLevel::Error.as_tracing_level(), Level::ERROR);
        assert_eq!(CliLogLevel::Trace.as_tracing_level(), Level::TRACE);
        assert_eq!(CliLogLevel::default(), CliLogLevel::Warn);
        assert_eq!(CliLogLevel::Debug.to_string(), "debug");
    }
}
