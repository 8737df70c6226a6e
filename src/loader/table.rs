//! Target table management

use tracing::{error, info};

use super::connector::Session;
use super::error::{LoadError, SchemaOperation};
use crate::database::TableDefinition;
use crate::database::schema::truncate_sql;

/// Creates and empties target tables
pub struct TableManager;

impl TableManager {
    /// Create the table if it does not exist yet
    ///
    /// An existing table is reused as-is, whatever its columns.
    pub async fn ensure_table(
        definition: &TableDefinition,
        session: &Session,
    ) -> Result<(), LoadError> {
        let sql = definition.create_table_sql(session.dialect());

        session
            .backend()
            .execute_batch(&sql)
            .await
            .map_err(|e| {
                error!("Error creating table {}: {}", definition.name, e);
                LoadError::SchemaOperationFailure {
                    table: definition.name.clone(),
                    operation: SchemaOperation::Create,
                    reason: e.to_string(),
                }
            })?;

        info!("Table '{}' created or already exists.", definition.name);
        Ok(())
    }

    /// Remove every row from the table
    pub async fn clear_table(table: &str, session: &Session) -> Result<(), LoadError> {
        session
            .backend()
            .execute_batch(&truncate_sql(table))
            .await
            .map_err(|e| {
                error!("Error truncating table {}: {}", table, e);
                LoadError::SchemaOperationFailure {
                    table: table.to_string(),
                    operation: SchemaOperation::Truncate,
                    reason: e.to_string(),
                }
            })?;

        info!("Table '{}' truncated.", table);
        Ok(())
    }
}
