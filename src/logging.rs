//! Tracing subscriber setup
//!
//! Events go to stderr and, when `[logging] file` is set, are appended to
//! that file as plain text.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log level '{0}'")]
    Filter(String),

    #[error("tracing already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Level filter from `RUST_LOG`, falling back to the configured level
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|_| LoggingError::Filter(level.to_string())),
    }
}

/// Install the global subscriber
///
/// Fails with [`LoggingError::AlreadyInitialized`] if one is already set.
pub fn init_logging(section: &LoggingSection) -> Result<(), LoggingError> {
    let filter = build_filter(&section.level)?;

    let file_layer = match &section.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bad_log_file_path() {
        let dir = tempdir().unwrap();
        let section = LoggingSection {
            level: "info".to_string(),
            file: Some(dir.path().join("missing").join("etl_log.log")),
        };
        assert!(matches!(
            init_logging(&section),
            Err(LoggingError::LogFile { .. })
        ));
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        if std::env::var("RUST_LOG").is_err() {
            assert!(build_filter("csv_table_loader=debug,warn").is_ok());
        }
    }
}
