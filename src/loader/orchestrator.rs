//! Run orchestration
//!
//! Drives one full-refresh run: discover input files, open the single
//! session, then derive, ensure, clear and load each file in order. A file
//! that fails is recorded and skipped; only discovery and connection
//! failures end the run early.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::connector::{Connector, RetryPolicy, Session, SessionFactory, factory_from_config};
use super::error::{LoadError, LoadStage};
use super::rows::RowLoader;
use super::source::{self, DiscoveredFile, SourceOptions};
use super::table::TableManager;
use crate::config::LoaderConfig;
use crate::database::DatabaseResult;

/// Final state of one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Loaded,
    Failed,
}

/// Result of processing one input file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    pub table: String,
    pub status: FileStatus,
    pub rows_inserted: u64,
    /// Stage that failed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<LoadStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    fn loaded(path: &Path, table: &str, rows_inserted: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            table: table.to_string(),
            status: FileStatus::Loaded,
            rows_inserted,
            stage: None,
            error: None,
        }
    }

    fn failed(path: &Path, table: &str, err: &LoadError) -> Self {
        Self {
            path: path.to_path_buf(),
            table: table.to_string(),
            status: FileStatus::Failed,
            rows_inserted: 0,
            stage: err.stage(),
            error: Some(err.to_string()),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileOutcome>,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_inserted: u64,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            files: Vec::new(),
            files_loaded: 0,
            files_failed: 0,
            rows_inserted: 0,
            duration: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Loaded => {
                self.files_loaded += 1;
                self.rows_inserted += outcome.rows_inserted;
            }
            FileStatus::Failed => self.files_failed += 1,
        }
        self.files.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    /// Outcomes of the files that failed
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
    }

    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs_f64();
        if secs >= 1.0 {
            format!("{:.2}s", secs)
        } else {
            format!("{}ms", self.duration.as_millis())
        }
    }

    /// One-line summary for the operator
    pub fn summary(&self) -> String {
        format!(
            "Loaded {} of {} files ({} failed), {} rows inserted in {}",
            self.files_loaded,
            self.files.len(),
            self.files_failed,
            self.rows_inserted,
            self.duration_string()
        )
    }
}

/// Runs the load pipeline over the configured input directory
pub struct Orchestrator {
    config: LoaderConfig,
    connector: Connector,
}

impl Orchestrator {
    /// Create an orchestrator using the given session factory
    ///
    /// The retry policy comes from `config.retry`.
    pub fn new(config: LoaderConfig, factory: Box<dyn SessionFactory>) -> Self {
        let policy = RetryPolicy::from_section(&config.retry);
        Self {
            connector: Connector::new(factory, policy),
            config,
        }
    }

    /// Create an orchestrator for the backend selected by the configuration
    pub fn from_config(config: LoaderConfig) -> DatabaseResult<Self> {
        let factory = factory_from_config(&config)?;
        Ok(Self::new(config, factory))
    }

    /// Replace the retry policy taken from the configuration
    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        let Orchestrator { config, connector } = self;
        let factory = connector.into_factory();
        Self {
            config,
            connector: Connector::new(factory, policy),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Execute one run
    ///
    /// Input files are discovered before the database is contacted. An
    /// unreadable input directory therefore ends the run with
    /// [`LoadError::Discovery`] even when the database is reachable, and the
    /// CLI exits 1 for it just as it does for a connection failure. Neither
    /// touches any table. Per-file failures are in the report.
    pub async fn run(&self) -> Result<RunReport, LoadError> {
        let clock = Instant::now();
        let mut report = RunReport::new(Uuid::new_v4(), Utc::now());

        info!(run_id = %report.run_id, "ETL process started.");

        let options = SourceOptions {
            delimiter: self
                .config
                .delimiter_byte()
                .map_err(LoadError::InvalidConfig)
                .inspect_err(|e| error!(severity = "critical", "{}", e))?,
            surrogate_key: self.config.schema.surrogate_key.clone(),
        };

        let files = source::discover_files(&self.config.input.directory, &self.config.input.pattern)
            .inspect_err(|e| error!(severity = "critical", "{}", e))?;

        if files.is_empty() {
            warn!(
                "No files matching '{}' found in {}",
                self.config.input.pattern,
                self.config.input.directory.display()
            );
        }

        let session = self.connector.acquire().await?;

        for file in &files {
            let outcome = self.process_file(file, &options, &session).await;
            report.record(outcome);
        }

        if let Err(e) = session.close().await {
            warn!("Error closing database connection: {}", e);
        }

        report.finished_at = Utc::now();
        report.duration = clock.elapsed();

        info!(
            run_id = %report.run_id,
            files_loaded = report.files_loaded,
            files_failed = report.files_failed,
            rows_inserted = report.rows_inserted,
            "ETL process completed."
        );

        Ok(report)
    }

    async fn process_file(
        &self,
        file: &DiscoveredFile,
        options: &SourceOptions,
        session: &Session,
    ) -> FileOutcome {
        let Some(table) = source::table_name_for(&file.path) else {
            let err = LoadError::source_read(&file.path, "cannot derive a table name");
            error!("{}", err);
            return FileOutcome::failed(&file.path, "", &err);
        };

        info!(
            "Processing file: {} into table: {}",
            file.path.display(),
            table
        );

        match self.load_file(&file.path, &table, options, session).await {
            Ok(rows) => {
                info!(
                    "Data from {} successfully written to table '{}'. Total rows inserted: {}.",
                    file.path.display(),
                    table,
                    rows
                );
                FileOutcome::loaded(&file.path, &table, rows)
            }
            Err(e) => {
                error!("Skipping file {}: {}", file.path.display(), e);
                FileOutcome::failed(&file.path, &table, &e)
            }
        }
    }

    async fn load_file(
        &self,
        path: &Path,
        table: &str,
        options: &SourceOptions,
        session: &Session,
    ) -> Result<u64, LoadError> {
        let source = source::derive(path, options)?;
        let definition = source.definition(table, &self.config.schema);

        TableManager::ensure_table(&definition, session).await?;
        TableManager::clear_table(table, session).await?;
        RowLoader::load(table, &source.fields, &source.rows, session).await
    }
}
