//! Database backend abstraction for the load pipeline
//!
//! This module provides the session layer the loader runs against:
//! - DuckDB: Embedded database, file-based or in-memory
//! - PostgreSQL: Server database via tokio-postgres
//!
//! Backends only expose what a full-refresh load needs: plain statements,
//! ad-hoc queries, a health check and a transactional batch insert.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use schema::{SqlDialect, TableDefinition, quote_ident};

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Backend compiled out of this build
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Values of one source row, bound positionally. `None` binds SQL NULL.
pub type RowValues = Vec<Option<String>>;

/// Failure of a transactional batch insert
///
/// The transaction has already been rolled back when this is returned;
/// `inserted` counts the rows that succeeded before the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("insert failed after {inserted} rows: {reason}")]
pub struct RowBatchError {
    /// Rows inserted (and discarded) before the failure
    pub inserted: u64,
    /// Underlying cause
    pub reason: String,
}

impl RowBatchError {
    pub fn new(inserted: u64, reason: impl Into<String>) -> Self {
        Self {
            inserted,
            reason: reason.into(),
        }
    }
}

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self { columns, rows }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Database backend trait for load sessions
///
/// All operations are async so the tokio-based PostgreSQL driver and the
/// embedded DuckDB driver share one interface. The loader awaits every call
/// in program order; nothing here is ever invoked concurrently.
#[async_trait(?Send)]
pub trait DatabaseBackend: Send + Sync {
    /// SQL dialect used when rendering statements for this backend
    fn dialect(&self) -> SqlDialect;

    /// Execute a single statement that returns no rows
    ///
    /// # Returns
    /// Number of rows affected
    async fn execute(&self, sql: &str) -> DatabaseResult<u64>;

    /// Execute one or more `;`-separated statements
    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Insert rows with a prepared statement inside one transaction
    ///
    /// # Arguments
    /// * `sql` - Parameterized insert, one placeholder per value
    /// * `rows` - Row values bound positionally, in order
    ///
    /// # Returns
    /// Number of rows inserted and committed. On any failure the whole
    /// transaction is rolled back before the error is returned.
    async fn insert_rows(&self, sql: &str, rows: &[RowValues]) -> Result<u64, RowBatchError>;

    /// Check whether a table with this name exists
    async fn table_exists(&self, table: &str) -> DatabaseResult<bool>;

    /// Count the rows of a table
    async fn count_rows(&self, table: &str) -> DatabaseResult<u64>;

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Get the database backend type name ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_counts() {
        let result = QueryResult::new(
            vec!["name".to_string()],
            vec![serde_json::json!({"name": "orders"})],
        );
        assert_eq!(result.row_count(), 1);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_row_batch_error_display() {
        let err = RowBatchError::new(4, "value too long");
        assert_eq!(err.to_string(), "insert failed after 4 rows: value too long");
    }
}
