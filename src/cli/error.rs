//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::loader::LoadError;
use crate::logging::LoggingError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0} file(s) failed to load")]
    FilesFailed(usize),

    #[error("File already exists: {0} (use --force to overwrite)")]
    FileExists(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl CliError {
    /// Process exit status for this error
    ///
    /// 2 when the run completed but files failed under `--strict`,
    /// 1 for everything that stopped the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::FilesFailed(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::FilesFailed(3).exit_code(), 2);
        assert_eq!(
            CliError::Config(DatabaseError::ConfigError("bad".to_string())).exit_code(),
            1
        );
        let conn = LoadError::ConnectionFailure {
            attempts: 3,
            source: DatabaseError::ConnectionFailed("refused".to_string()),
        };
        assert_eq!(CliError::from(conn).exit_code(), 1);

        let discovery = LoadError::Discovery {
            path: PathBuf::from("csv_files"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(CliError::from(discovery).exit_code(), 1);
    }
}
