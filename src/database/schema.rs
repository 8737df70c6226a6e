//! Table definitions and SQL rendering
//!
//! Renders the handful of statements the loader needs (create-if-absent,
//! truncate, parameterized insert) for both DuckDB and PostgreSQL.
//! Every identifier is double-quoted, so header names are used verbatim.

use serde::{Deserialize, Serialize};

/// Default maximum length of every derived text column
pub const DEFAULT_TEXT_LENGTH: u32 = 255;

/// Default name of the surrogate key column added to every derived table
pub const DEFAULT_SURROGATE_KEY: &str = "_row_id";

/// SQL dialect spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// DuckDB (`?` placeholders, sequences for auto-increment)
    DuckDB,
    /// PostgreSQL (`$n` placeholders, `BIGSERIAL`)
    Postgres,
}

impl SqlDialect {
    /// Positional parameter placeholder (1-based)
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            SqlDialect::DuckDB => "?".to_string(),
            SqlDialect::Postgres => format!("${}", position),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::DuckDB => write!(f, "duckdb"),
            SqlDialect::Postgres => write!(f, "postgres"),
        }
    }
}

/// Quote an identifier, doubling any embedded double quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A single declared column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, as read from the header
    pub name: String,
    /// Declared SQL type
    pub data_type: String,
}

/// Derived table definition
///
/// An implicit auto-incrementing surrogate key comes first, followed by one
/// text column per header field in header order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Target table name
    pub name: String,
    /// Surrogate key column name
    pub surrogate_key: String,
    /// Data columns, in source order
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Build a definition where every field is `VARCHAR(text_length)`
    pub fn text_table(
        name: impl Into<String>,
        surrogate_key: impl Into<String>,
        fields: &[String],
        text_length: u32,
    ) -> Self {
        let data_type = format!("VARCHAR({})", text_length);
        Self {
            name: name.into(),
            surrogate_key: surrogate_key.into(),
            columns: fields
                .iter()
                .map(|field| ColumnDefinition {
                    name: field.clone(),
                    data_type: data_type.clone(),
                })
                .collect(),
        }
    }

    /// Data column names in declaration order
    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Name of the DuckDB sequence backing the surrogate key
    pub fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.name, self.surrogate_key)
    }

    /// Create-if-absent DDL for the given dialect
    ///
    /// DuckDB has no auto-increment column type, so the statement is
    /// preceded by a `CREATE SEQUENCE IF NOT EXISTS`. `nextval` parses its
    /// argument as a possibly qualified name, so the sequence is quoted
    /// inside the literal as well.
    pub fn create_table_sql(&self, dialect: SqlDialect) -> String {
        let key = match dialect {
            SqlDialect::Postgres => {
                format!("{} BIGSERIAL PRIMARY KEY", quote_ident(&self.surrogate_key))
            }
            SqlDialect::DuckDB => format!(
                "{} BIGINT PRIMARY KEY DEFAULT nextval({})",
                quote_ident(&self.surrogate_key),
                quote_literal(&quote_ident(&self.sequence_name()))
            ),
        };

        let mut lines = vec![format!("    {}", key)];
        lines.extend(
            self.columns
                .iter()
                .map(|c| format!("    {} {}", quote_ident(&c.name), c.data_type)),
        );

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            quote_ident(&self.name),
            lines.join(",\n")
        );

        match dialect {
            SqlDialect::Postgres => create,
            SqlDialect::DuckDB => format!(
                "CREATE SEQUENCE IF NOT EXISTS {};\n{}",
                quote_ident(&self.sequence_name()),
                create
            ),
        }
    }
}

/// Empty a table while keeping its definition
pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {};", quote_ident(table))
}

/// Parameterized single-row insert binding `fields` positionally
pub fn insert_sql(dialect: SqlDialect, table: &str, fields: &[String]) -> String {
    let columns: Vec<String> = fields.iter().map(|f| quote_ident(f)).collect();
    let placeholders: Vec<String> = (1..=fields.len())
        .map(|i| dialect.placeholder(i))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableDefinition {
        TableDefinition::text_table(
            "orders",
            DEFAULT_SURROGATE_KEY,
            &["id".to_string(), "amount".to_string()],
            DEFAULT_TEXT_LENGTH,
        )
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("my \"odd\" name"), "\"my \"\"odd\"\" name\"");
    }

    #[test]
    fn test_text_table_types_every_field_as_varchar() {
        let def = orders();
        assert_eq!(def.field_names(), vec!["id", "amount"]);
        assert!(def.columns.iter().all(|c| c.data_type == "VARCHAR(255)"));
    }

    #[test]
    fn test_create_table_sql_postgres() {
        let sql = orders().create_table_sql(SqlDialect::Postgres);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"orders\""));
        assert!(sql.contains("\"_row_id\" BIGSERIAL PRIMARY KEY"));
        assert!(sql.contains("\"id\" VARCHAR(255)"));
        assert!(sql.contains("\"amount\" VARCHAR(255)"));
        assert!(!sql.contains("SEQUENCE"));

        // Surrogate key is declared before the data columns
        let key_pos = sql.find("_row_id").unwrap();
        let id_pos = sql.find("\"id\"").unwrap();
        assert!(key_pos < id_pos);
    }

    #[test]
    fn test_create_table_sql_duckdb_uses_sequence() {
        let sql = orders().create_table_sql(SqlDialect::DuckDB);
        assert!(sql.starts_with("CREATE SEQUENCE IF NOT EXISTS \"orders__row_id_seq\";"));
        assert!(sql.contains("BIGINT PRIMARY KEY DEFAULT nextval('\"orders__row_id_seq\"')"));
    }

    #[test]
    fn test_create_table_sql_duckdb_dotted_name() {
        let def = TableDefinition::text_table(
            "sales.2024",
            DEFAULT_SURROGATE_KEY,
            &["region".to_string()],
            DEFAULT_TEXT_LENGTH,
        );
        let sql = def.create_table_sql(SqlDialect::DuckDB);
        assert!(sql.starts_with("CREATE SEQUENCE IF NOT EXISTS \"sales.2024__row_id_seq\";"));
        assert!(sql.contains("nextval('\"sales.2024__row_id_seq\"')"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"sales.2024\""));
    }

    #[test]
    fn test_insert_sql_placeholders() {
        let def = orders();
        assert_eq!(
            insert_sql(SqlDialect::Postgres, &def.name, &def.field_names()),
            "INSERT INTO \"orders\" (\"id\", \"amount\") VALUES ($1, $2)"
        );
        assert_eq!(
            insert_sql(SqlDialect::DuckDB, &def.name, &def.field_names()),
            "INSERT INTO \"orders\" (\"id\", \"amount\") VALUES (?, ?)"
        );
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("sales"), "TRUNCATE TABLE \"sales\";");
    }
}
