//! Session acquisition with bounded retry
//!
//! The [`Connector`] opens exactly one database session per run through a
//! [`SessionFactory`], retrying according to a [`RetryPolicy`]. The
//! resulting [`Session`] is owned by the orchestrator and closed once.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::error::LoadError;
use crate::config::{BackoffKind, DatabaseBackendType, LoaderConfig, RetrySection};
use crate::database::{DatabaseBackend, DatabaseResult, SqlDialect};

/// Upper bound on a single exponential backoff sleep
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Bounded retry policy for connection attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    pub backoff: BackoffKind,
    /// Multiplier applied per failed attempt for exponential backoff
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Same delay before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: BackoffKind::Fixed,
            factor: 1.0,
        }
    }

    /// Delay grows by `factor` after every failed attempt
    pub fn exponential(max_attempts: u32, delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: BackoffKind::Exponential,
            factor,
        }
    }

    /// Retry without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    pub fn from_section(section: &RetrySection) -> Self {
        let delay = Duration::from_millis(section.delay_ms);
        match section.backoff {
            BackoffKind::Fixed => Self::fixed(section.max_attempts, delay),
            BackoffKind::Exponential => {
                Self::exponential(section.max_attempts, delay, section.factor)
            }
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// Exponential delays are capped at [`MAX_RETRY_DELAY`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.delay,
            BackoffKind::Exponential => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = self.delay.as_secs_f64() * self.factor.max(1.0).powi(exponent);
                Duration::try_from_secs_f64(secs)
                    .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
            }
        }
    }
}

/// Opens database backends
///
/// Implementations perform whatever health check they need before
/// returning, so a returned backend is ready for use.
#[async_trait(?Send)]
pub trait SessionFactory {
    /// Connection target for log messages, without credentials
    fn describe(&self) -> String;

    /// Open a fresh backend connection
    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseBackend>>;
}

/// Opens DuckDB databases
#[cfg(feature = "duckdb-backend")]
pub struct DuckDBFactory {
    /// `None` opens an in-memory database
    path: Option<std::path::PathBuf>,
}

#[cfg(feature = "duckdb-backend")]
impl DuckDBFactory {
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }
}

#[cfg(feature = "duckdb-backend")]
#[async_trait(?Send)]
impl SessionFactory for DuckDBFactory {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("duckdb:{}", path.display()),
            None => "duckdb::memory:".to_string(),
        }
    }

    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseBackend>> {
        use crate::database::duckdb::DuckDBBackend;

        let backend = match &self.path {
            Some(path) => DuckDBBackend::new(path)?,
            None => DuckDBBackend::in_memory()?,
        };
        backend.health_check().await?;
        Ok(Box::new(backend))
    }
}

/// Opens PostgreSQL connections
#[cfg(feature = "postgres-backend")]
pub struct PostgresFactory {
    section: crate::config::PostgresSection,
}

#[cfg(feature = "postgres-backend")]
impl PostgresFactory {
    pub fn new(section: crate::config::PostgresSection) -> Self {
        Self { section }
    }
}

#[cfg(feature = "postgres-backend")]
#[async_trait(?Send)]
impl SessionFactory for PostgresFactory {
    fn describe(&self) -> String {
        self.section.describe()
    }

    async fn open(&self) -> DatabaseResult<Box<dyn DatabaseBackend>> {
        use crate::database::postgres::PostgresBackend;

        let backend = PostgresBackend::connect(&self.section).await?;
        backend.health_check().await?;
        Ok(Box::new(backend))
    }
}

/// Build the factory selected by the configuration
pub fn factory_from_config(config: &LoaderConfig) -> DatabaseResult<Box<dyn SessionFactory>> {
    match config.database.backend {
        DatabaseBackendType::DuckDB => {
            #[cfg(feature = "duckdb-backend")]
            {
                if config.database.path == ":memory:" {
                    Ok(Box::new(DuckDBFactory::in_memory()))
                } else {
                    Ok(Box::new(DuckDBFactory::file(&config.database.path)))
                }
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                Err(crate::database::DatabaseError::BackendUnavailable(
                    "DuckDB backend not enabled. Build with --features duckdb-backend".to_string(),
                ))
            }
        }
        DatabaseBackendType::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                Ok(Box::new(PostgresFactory::new(config.postgres.clone())))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(crate::database::DatabaseError::BackendUnavailable(
                    "PostgreSQL backend not enabled. Build with --features postgres-backend"
                        .to_string(),
                ))
            }
        }
    }
}

/// The single live database session of a run
///
/// Consumed by [`Session::close`]. Dropping an unclosed session still
/// releases the connection, but logs a warning.
pub struct Session {
    backend: Box<dyn DatabaseBackend>,
    closed: bool,
}

impl Session {
    pub fn new(backend: Box<dyn DatabaseBackend>) -> Self {
        Self {
            backend,
            closed: false,
        }
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    pub fn dialect(&self) -> SqlDialect {
        self.backend.dialect()
    }

    /// Close the session, releasing the connection
    pub async fn close(mut self) -> DatabaseResult<()> {
        let result = self.backend.close().await;
        self.closed = true;
        info!("Database connection closed.");
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                backend = self.backend.backend_type(),
                "Database session dropped without close; releasing connection"
            );
        }
    }
}

/// Acquires the run's database session
pub struct Connector {
    factory: Box<dyn SessionFactory>,
    policy: RetryPolicy,
}

impl Connector {
    pub fn new(factory: Box<dyn SessionFactory>, policy: RetryPolicy) -> Self {
        Self { factory, policy }
    }

    pub fn into_factory(self) -> Box<dyn SessionFactory> {
        self.factory
    }

    /// Open a session, retrying per the policy
    ///
    /// Sleeps between attempts only, never after the last one.
    pub async fn acquire(&self) -> Result<Session, LoadError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.factory.open().await {
                Ok(backend) => {
                    info!(
                        backend = backend.backend_type(),
                        target = %self.factory.describe(),
                        attempt,
                        "Successfully connected to the database!"
                    );
                    return Ok(Session::new(backend));
                }
                Err(e) => {
                    error!(
                        "Database connection attempt {} of {} failed: {}",
                        attempt, max_attempts, e
                    );

                    if attempt >= max_attempts {
                        error!(
                            severity = "critical",
                            "Failed to connect to database after {} attempts. Aborting ETL process.",
                            attempt
                        );
                        return Err(LoadError::ConnectionFailure {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let delay = self.policy.delay_after(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;
    use std::cell::Cell;

    /// Fails a fixed number of times before delegating to in-memory DuckDB
    struct FlakyFactory {
        failures: u32,
        calls: Cell<u32>,
    }

    impl FlakyFactory {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl SessionFactory for FlakyFactory {
        fn describe(&self) -> String {
            "flaky".to_string()
        }

        async fn open(&self) -> DatabaseResult<Box<dyn DatabaseBackend>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call <= self.failures {
                return Err(DatabaseError::ConnectionFailed(format!(
                    "refused on call {}",
                    call
                )));
            }
            #[cfg(feature = "duckdb-backend")]
            {
                DuckDBFactory::in_memory().open().await
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                Err(DatabaseError::BackendUnavailable("duckdb".to_string()))
            }
        }
    }

    #[test]
    fn test_default_policy_matches_fixed_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(4, Duration::from_millis(100), 2.0);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_exponential_delay_is_capped_for_late_attempts() {
        let policy = RetryPolicy::exponential(40, Duration::from_secs(5), 10.0);
        assert_eq!(policy.delay_after(30), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_after(u32::MAX), MAX_RETRY_DELAY);

        let unbounded = RetryPolicy::exponential(3, Duration::from_millis(1), f64::INFINITY);
        assert_eq!(unbounded.delay_after(2), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_policy_from_section() {
        let section = RetrySection {
            max_attempts: 5,
            delay_ms: 250,
            backoff: BackoffKind::Exponential,
            factor: 3.0,
        };
        let policy = RetryPolicy::from_section(&section);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(2), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_acquire_gives_up_after_max_attempts() {
        let connector = Connector::new(
            Box::new(FlakyFactory::new(u32::MAX)),
            RetryPolicy::immediate(3),
        );

        match connector.acquire().await {
            Err(LoadError::ConnectionFailure { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("call 3"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connection should not succeed"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sleeps_between_attempts_only() {
        let connector = Connector::new(
            Box::new(FlakyFactory::new(u32::MAX)),
            RetryPolicy::fixed(3, Duration::from_secs(5)),
        );

        let start = tokio::time::Instant::now();
        assert!(connector.acquire().await.is_err());
        // Two sleeps between three attempts
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[cfg(feature = "duckdb-backend")]
    #[tokio::test]
    async fn test_acquire_recovers_after_transient_failures() {
        let connector = Connector::new(Box::new(FlakyFactory::new(2)), RetryPolicy::immediate(3));

        let session = connector.acquire().await.unwrap();
        assert_eq!(session.dialect(), SqlDialect::DuckDB);
        session.close().await.unwrap();
    }

    #[cfg(feature = "duckdb-backend")]
    #[test]
    fn test_factory_from_config_in_memory() {
        let config = LoaderConfig::duckdb(":memory:");
        let factory = factory_from_config(&config).unwrap();
        assert_eq!(factory.describe(), "duckdb::memory:");
    }
}
