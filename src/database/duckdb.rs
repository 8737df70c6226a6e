//! DuckDB database backend implementation
//!
//! Provides an embedded database backend using DuckDB. Used for local runs
//! and for exercising the full pipeline in tests without a server.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use super::{
    DatabaseBackend, DatabaseError, DatabaseResult, QueryResult, RowBatchError, RowValues,
    SqlDialect, quote_ident,
};

/// DuckDB database backend
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBBackend {
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    ///
    /// # Returns
    /// A new DuckDB backend instance
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open(db_path.as_ref()).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> DatabaseResult<std::sync::MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            other => serde_json::Value::String(format!("{:?}", other)),
        }
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for DuckDBBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::DuckDB
    }

    async fn execute(&self, sql: &str) -> DatabaseResult<u64> {
        let conn = self.lock()?;

        conn.execute(sql, [])
            .map(|n| n as u64)
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult::new(columns, rows))
    }

    async fn insert_rows(&self, sql: &str, rows: &[RowValues]) -> Result<u64, RowBatchError> {
        let mut conn = self
            .connection
            .lock()
            .map_err(|e| RowBatchError::new(0, format!("Lock error: {}", e)))?;

        let tx = conn
            .transaction()
            .map_err(|e| RowBatchError::new(0, format!("Failed to begin transaction: {}", e)))?;

        let mut inserted = 0u64;
        let outcome = match tx.prepare(sql) {
            Ok(mut stmt) => {
                let mut outcome = Ok(());
                for row in rows {
                    if let Err(e) = stmt.execute(duckdb::params_from_iter(row.iter())) {
                        outcome = Err(format!("Insert failed: {}", e));
                        break;
                    }
                    inserted += 1;
                }
                outcome
            }
            Err(e) => Err(format!("Prepare failed: {}", e)),
        };

        match outcome {
            Ok(()) => {
                tx.commit()
                    .map_err(|e| RowBatchError::new(inserted, format!("Commit failed: {}", e)))?;
                Ok(inserted)
            }
            Err(reason) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!("Rollback after failed insert also failed: {}", e);
                }
                Err(RowBatchError::new(inserted, reason))
            }
        }
    }

    async fn table_exists(&self, table: &str) -> DatabaseResult<bool> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE lower(table_name) = lower(?)",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Table lookup failed: {}", e)))?;

        Ok(count > 0)
    }

    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;

        Ok(count as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.execute_query("SELECT 1 as healthy").await?;
        Ok(!result.rows.is_empty())
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // The connection itself is released when the backend is dropped
        Ok(())
    }
}
