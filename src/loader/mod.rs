//! Full-refresh load pipeline
//!
//! Components, leaves first:
//! - [`connector`]: acquires the run's single database session with retry
//! - [`source`]: discovers input files and derives a schema from each header
//! - [`table`]: creates target tables if absent and empties them
//! - [`rows`]: inserts a file's rows inside one transaction
//! - [`orchestrator`]: drives the above per file and builds the run report

pub mod connector;
pub mod error;
pub mod orchestrator;
pub mod rows;
pub mod source;
pub mod table;

pub use connector::{
    Connector, MAX_RETRY_DELAY, RetryPolicy, Session, SessionFactory, factory_from_config,
};
#[cfg(feature = "duckdb-backend")]
pub use connector::DuckDBFactory;
#[cfg(feature = "postgres-backend")]
pub use connector::PostgresFactory;
pub use error::{LoadError, LoadStage, SchemaOperation};
pub use orchestrator::{FileOutcome, FileStatus, Orchestrator, RunReport};
pub use rows::RowLoader;
pub use source::{DiscoveredFile, SourceFile, SourceOptions, derive, discover_files};
pub use table::TableManager;
