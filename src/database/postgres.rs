//! PostgreSQL database backend implementation
//!
//! Provides a PostgreSQL backend for server deployments. A single
//! tokio-postgres client is held for the lifetime of the load session;
//! there is no pooling.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;

use super::{
    DatabaseBackend, DatabaseError, DatabaseResult, QueryResult, RowBatchError, RowValues,
    SqlDialect, quote_ident,
};
use crate::config::PostgresSection;

/// PostgreSQL database backend
pub struct PostgresBackend {
    /// PostgreSQL client (wrapped for async access)
    client: Mutex<tokio_postgres::Client>,
}

impl PostgresBackend {
    /// Connect using the configured parameters
    ///
    /// Must be called from within a tokio runtime; the connection driver is
    /// spawned onto it.
    pub async fn connect(section: &PostgresSection) -> DatabaseResult<Self> {
        let config = Self::client_config(section)?;

        let (client, connection) = config.connect(tokio_postgres::NoTls).await.map_err(|e| {
            DatabaseError::ConnectionFailed(format!(
                "Failed to connect to PostgreSQL at {}: {}",
                section.describe(),
                e
            ))
        })?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    /// Build the driver configuration from a connection string or parameters
    pub fn client_config(section: &PostgresSection) -> DatabaseResult<tokio_postgres::Config> {
        if let Some(url) = &section.connection_string {
            return url.parse::<tokio_postgres::Config>().map_err(|e| {
                DatabaseError::ConfigError(format!("Invalid PostgreSQL connection string: {}", e))
            });
        }

        let mut config = tokio_postgres::Config::new();
        config.host(&section.host).port(section.port);
        if let Some(database) = &section.database {
            config.dbname(database);
        }
        if let Some(user) = &section.user {
            config.user(user);
        }
        if let Some(password) = &section.password {
            config.password(password);
        }
        Ok(config)
    }

    /// Convert a PostgreSQL row to a JSON value
    fn row_to_json(row: &tokio_postgres::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            map.insert(col_name.clone(), Self::get_column_value(row, i));
        }

        serde_json::Value::Object(map)
    }

    /// Get a column value as JSON
    fn get_column_value(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
        if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }

        serde_json::Value::Null
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for PostgresBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    async fn execute(&self, sql: &str) -> DatabaseResult<u64> {
        let client = self.client.lock().await;

        client
            .execute(sql, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        let client = self.client.lock().await;

        client
            .batch_execute(sql)
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let client = self.client.lock().await;

        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let json_rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| Self::row_to_json(row, &columns))
            .collect();

        Ok(QueryResult::new(columns, json_rows))
    }

    async fn insert_rows(&self, sql: &str, rows: &[RowValues]) -> Result<u64, RowBatchError> {
        let mut client = self.client.lock().await;

        let tx = client
            .transaction()
            .await
            .map_err(|e| RowBatchError::new(0, format!("Failed to begin transaction: {}", e)))?;

        let stmt = match tx.prepare(sql).await {
            Ok(stmt) => stmt,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!("Rollback after failed prepare also failed: {}", rb);
                }
                return Err(RowBatchError::new(0, format!("Prepare failed: {}", e)));
            }
        };

        let mut inserted = 0u64;
        for row in rows {
            let params: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

            if let Err(e) = tx.execute(&stmt, &params).await {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!("Rollback after failed insert also failed: {}", rb);
                }
                return Err(RowBatchError::new(inserted, format!("Insert failed: {}", e)));
            }
            inserted += 1;
        }

        tx.commit()
            .await
            .map_err(|e| RowBatchError::new(inserted, format!("Commit failed: {}", e)))?;

        Ok(inserted)
    }

    async fn table_exists(&self, table: &str) -> DatabaseResult<bool> {
        let client = self.client.lock().await;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&table],
            )
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Table lookup failed: {}", e)))?;

        let count: i64 = row
            .try_get(0)
            .map_err(|e| DatabaseError::QueryFailed(format!("Table lookup failed: {}", e)))?;

        Ok(count > 0)
    }

    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        let client = self.client.lock().await;

        let row = client
            .query_one(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;

        let count: i64 = row
            .try_get(0)
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;

        Ok(count as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.execute_query("SELECT 1 as healthy").await?;
        Ok(!result.rows.is_empty())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // PostgreSQL connection is closed when client is dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_POSTGRES_URL;
    use crate::database::schema::{SqlDialect, insert_sql};

    #[test]
    fn test_client_config_from_parameters() {
        let section = PostgresSection {
            host: "db.internal".to_string(),
            port: 6543,
            database: Some("warehouse".to_string()),
            user: Some("loader".to_string()),
            password: Some("secret".to_string()),
            connection_string: None,
        };

        let config = PostgresBackend::client_config(&section).unwrap();
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_dbname(), Some("warehouse"));
        assert_eq!(config.get_user(), Some("loader"));
        assert_eq!(config.get_password(), Some("secret".as_bytes()));
    }

    #[test]
    fn test_client_config_prefers_connection_string() {
        let section = PostgresSection {
            database: Some("ignored".to_string()),
            connection_string: Some("postgresql://app:pw@localhost:5432/appdb".to_string()),
            ..Default::default()
        };

        let config = PostgresBackend::client_config(&section).unwrap();
        assert_eq!(config.get_dbname(), Some("appdb"));
        assert_eq!(config.get_user(), Some("app"));
    }

    #[test]
    fn test_client_config_rejects_garbage() {
        let section = PostgresSection {
            connection_string: Some("bogus_option=1".to_string()),
            ..Default::default()
        };
        assert!(PostgresBackend::client_config(&section).is_err());
    }

    #[test]
    fn test_insert_uses_numbered_placeholders() {
        let fields = vec!["id".to_string(), "unit price".to_string(), "note".to_string()];
        assert_eq!(
            insert_sql(SqlDialect::Postgres, "orders", &fields),
            "INSERT INTO \"orders\" (\"id\", \"unit price\", \"note\") VALUES ($1, $2, $3)"
        );
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL server at CSV_LOADER_POSTGRES_URL"]
    async fn test_insert_rows_rolls_back_on_failure() {
        let Ok(url) = std::env::var(ENV_POSTGRES_URL) else {
            return;
        };
        let section = PostgresSection {
            connection_string: Some(url),
            ..Default::default()
        };
        let backend = PostgresBackend::connect(&section).await.unwrap();

        let table = format!("rollback_{}", uuid::Uuid::new_v4().simple());
        backend
            .execute_batch(&format!(
                "CREATE TABLE \"{}\" (v VARCHAR(50) CHECK (v <> 'bad'))",
                table
            ))
            .await
            .unwrap();

        let sql = insert_sql(SqlDialect::Postgres, &table, &["v".to_string()]);
        let rows: Vec<RowValues> = vec![
            vec![Some("a".to_string())],
            vec![None],
            vec![Some("bad".to_string())],
            vec![Some("d".to_string())],
        ];

        let err = backend.insert_rows(&sql, &rows).await.unwrap_err();
        assert_eq!(err.inserted, 2);
        assert!(err.reason.starts_with("Insert failed"));
        assert_eq!(backend.count_rows(&table).await.unwrap(), 0);

        backend
            .execute(&format!("DROP TABLE \"{}\"", table))
            .await
            .unwrap();
        backend.close().await.unwrap();
    }
}
