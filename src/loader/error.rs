//! Load pipeline error taxonomy

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::database::DatabaseError;

/// Schema statement that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaOperation {
    Create,
    Truncate,
}

impl std::fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaOperation::Create => write!(f, "creating"),
            SchemaOperation::Truncate => write!(f, "truncating"),
        }
    }
}

/// Per-file pipeline stage, used to report where a file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStage {
    Deriving,
    TableEnsuring,
    Loading,
}

/// Errors raised by the load pipeline
///
/// `ConnectionFailure`, `Discovery` and `InvalidConfig` end a run. Every
/// other variant is file-local: the orchestrator records it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Connection retry budget exhausted
    #[error("Failed to connect to database after {attempts} attempts: {source}")]
    ConnectionFailure {
        attempts: u32,
        #[source]
        source: DatabaseError,
    },

    /// Source file unreadable or malformed
    #[error("Error loading source file {}: {reason}", path.display())]
    SourceReadFailure { path: PathBuf, reason: String },

    /// Create or truncate statement failed
    #[error("Error {operation} table {table}: {reason}")]
    SchemaOperationFailure {
        table: String,
        operation: SchemaOperation,
        reason: String,
    },

    /// Row insertion failed and was rolled back
    #[error(
        "Error inserting data into table {table}: {reason} ({rows_before_failure} rows rolled back)"
    )]
    LoadFailure {
        table: String,
        reason: String,
        rows_before_failure: u64,
    },

    /// Input directory could not be enumerated
    #[error("Failed to read input directory {}: {reason}", path.display())]
    Discovery { path: PathBuf, reason: String },

    /// Configuration unusable for a run
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[source] DatabaseError),
}

impl LoadError {
    /// Whether this error is confined to a single input file
    pub fn is_file_local(&self) -> bool {
        matches!(
            self,
            LoadError::SourceReadFailure { .. }
                | LoadError::SchemaOperationFailure { .. }
                | LoadError::LoadFailure { .. }
        )
    }

    /// Per-file stage this error belongs to, if file-local
    pub fn stage(&self) -> Option<LoadStage> {
        match self {
            LoadError::SourceReadFailure { .. } => Some(LoadStage::Deriving),
            LoadError::SchemaOperationFailure { .. } => Some(LoadStage::TableEnsuring),
            LoadError::LoadFailure { .. } => Some(LoadStage::Loading),
            LoadError::ConnectionFailure { .. }
            | LoadError::Discovery { .. }
            | LoadError::InvalidConfig(_) => None,
        }
    }

    pub(crate) fn source_read(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        LoadError::SourceReadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let conn = LoadError::ConnectionFailure {
            attempts: 3,
            source: DatabaseError::ConnectionFailed("refused".to_string()),
        };
        assert!(!conn.is_file_local());
        assert_eq!(conn.stage(), None);

        let read = LoadError::source_read("data/orders.csv", "bad row");
        assert!(read.is_file_local());
        assert_eq!(read.stage(), Some(LoadStage::Deriving));

        let load = LoadError::LoadFailure {
            table: "orders".to_string(),
            reason: "constraint".to_string(),
            rows_before_failure: 7,
        };
        assert_eq!(load.stage(), Some(LoadStage::Loading));
    }

    #[test]
    fn test_messages_carry_context() {
        let err = LoadError::SchemaOperationFailure {
            table: "sales".to_string(),
            operation: SchemaOperation::Truncate,
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error truncating table sales: permission denied"
        );

        let err = LoadError::LoadFailure {
            table: "orders".to_string(),
            reason: "value too long".to_string(),
            rows_before_failure: 2,
        };
        assert!(err.to_string().contains("orders"));
        assert!(err.to_string().contains("2 rows rolled back"));
    }
}
