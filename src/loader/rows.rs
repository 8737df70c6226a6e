//! Transactional row insertion

use tracing::{error, info};

use super::connector::Session;
use super::error::LoadError;
use crate::database::RowValues;
use crate::database::schema::insert_sql;

/// Inserts a file's rows in one transaction
pub struct RowLoader;

impl RowLoader {
    /// Insert `rows` into `table`, binding values to `fields` by position
    ///
    /// Either every row is committed or none is. On failure the session is
    /// still usable for the next file.
    pub async fn load(
        table: &str,
        fields: &[String],
        rows: &[RowValues],
        session: &Session,
    ) -> Result<u64, LoadError> {
        let sql = insert_sql(session.dialect(), table, fields);

        match session.backend().insert_rows(&sql, rows).await {
            Ok(inserted) => {
                info!(table, rows = inserted, "Committed {} rows", inserted);
                Ok(inserted)
            }
            Err(e) => {
                error!(
                    "Error inserting data into table {}: {} ({} rows rolled back)",
                    table, e.reason, e.inserted
                );
                Err(LoadError::LoadFailure {
                    table: table.to_string(),
                    reason: e.reason,
                    rows_before_failure: e.inserted,
                })
            }
        }
    }
}

#[cfg(all(test, feature = "duckdb-backend"))]
mod tests {
    use super::*;
    use crate::database::DuckDBBackend;

    fn row(cells: &[&str]) -> RowValues {
        cells.iter().map(|c| Some(c.to_string())).collect()
    }

    #[tokio::test]
    async fn test_load_zero_rows_commits() {
        let session = Session::new(Box::new(DuckDBBackend::in_memory().unwrap()));
        session
            .backend()
            .execute("CREATE TABLE empty (a VARCHAR)")
            .await
            .unwrap();

        let inserted = RowLoader::load("empty", &["a".to_string()], &[], &session)
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_failure_reports_rows_before_failure() {
        let session = Session::new(Box::new(DuckDBBackend::in_memory().unwrap()));
        session
            .backend()
            .execute("CREATE TABLE t (v VARCHAR CHECK (v <> 'x'))")
            .await
            .unwrap();

        let rows = vec![row(&["a"]), row(&["x"])];
        let err = RowLoader::load("t", &["v".to_string()], &rows, &session)
            .await
            .unwrap_err();
        match err {
            LoadError::LoadFailure {
                table,
                rows_before_failure,
                ..
            } => {
                assert_eq!(table, "t");
                assert_eq!(rows_before_failure, 1);
            }
            other => panic!("unexpected error: {}", other),
        }

        // Session survives the failed file
        assert_eq!(session.backend().count_rows("t").await.unwrap(), 0);
        session.close().await.unwrap();
    }
}
