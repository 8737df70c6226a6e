//! CSV table loader - full-refresh loading of delimited files into SQL tables
//!
//! Provides:
//! - Input discovery and header-driven schema derivation
//! - Table creation and truncation for DuckDB and PostgreSQL
//! - Transactional per-file row loading with partial-failure containment
//! - Connection acquisition with bounded retry
//! - Layered configuration (TOML file plus environment overrides)

pub mod config;
pub mod database;
pub mod loader;
pub mod logging;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::LoaderConfig;
pub use database::{DatabaseBackend, DatabaseError, DatabaseResult, SqlDialect, TableDefinition};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresBackend;
pub use loader::{
    FileOutcome, FileStatus, LoadError, Orchestrator, RetryPolicy, RunReport, Session,
    SessionFactory,
};
pub use logging::{LoggingError, init_logging};
