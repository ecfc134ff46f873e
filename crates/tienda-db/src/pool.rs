//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Web app startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::from_env() / DbConfig::new(path) ← Configure pool settings  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ Concurrent request handlers                                    │
//! │       ▼                                                                 │
//! │  Reads run in parallel. Writers queue on SQLite's single write lock,   │
//! │  waiting up to `busy_timeout` before reporting DbError::Busy.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the writer and the writer doesn't block readers.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::branch::BranchRepository;
use crate::repository::cash_register::CashRegisterRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::quotation::QuotationRepository;
use crate::repository::sequence::SequenceAllocator;

/// Database path used when `TIENDA_DATABASE_PATH` is unset.
pub const DEFAULT_DATABASE_PATH: &str = "./tienda.db";

const ENV_DATABASE_PATH: &str = "TIENDA_DATABASE_PATH";
const ENV_MAX_CONNECTIONS: &str = "TIENDA_DB_MAX_CONNECTIONS";
const ENV_BUSY_TIMEOUT_SECS: &str = "TIENDA_DB_BUSY_TIMEOUT_SECS";

// =============================================================================
// Configuration
// =============================================================================

/// Invalid value in the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tienda/tienda.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Pool acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a statement waits on SQLite's write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`. The file is
    /// created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// | Variable                       | Default         |
    /// |--------------------------------|-----------------|
    /// | `TIENDA_DATABASE_PATH`         | `./tienda.db`   |
    /// | `TIENDA_DB_MAX_CONNECTIONS`    | 5               |
    /// | `TIENDA_DB_BUSY_TIMEOUT_SECS`  | 5               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`DbConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match lookup(ENV_DATABASE_PATH) {
            Some(path) if path.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: ENV_DATABASE_PATH,
                })
            }
            Some(path) => path,
            None => DEFAULT_DATABASE_PATH.to_string(),
        };

        let mut config = DbConfig::new(path);

        if let Some(max) = parse_positive(&lookup, ENV_MAX_CONNECTIONS)? {
            config.max_connections = max as u32;
            config.min_connections = config.min_connections.min(config.max_connections);
        }
        if let Some(secs) = parse_positive(&lookup, ENV_BUSY_TIMEOUT_SECS)? {
            config.busy_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long writers wait on the SQLite lock.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The pool holds a single connection so every query sees the same
    /// database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber { var, value: raw }),
        },
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; every clone shares the pool.
///
/// ## Usage in Route Handlers
/// ```rust,ignore
/// async fn create_quotation(
///     db: &Database,
///     tenant: TenantId,      // resolved from the URL slug upstream
///     body: NewQuotation,
/// ) -> DbResult<Quotation> {
///     db.quotations().create(&tenant, body).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - busy timeout for queued writers
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_url = if config.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!(busy_timeout = ?config.busy_timeout, "Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Called by `new()` unless disabled.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the quotation repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let page = db.quotations().list(&tenant, &QuotationFilter::default()).await?;
    /// ```
    pub fn quotations(&self) -> QuotationRepository {
        QuotationRepository::new(self.pool.clone())
    }

    /// Returns the cash register repository.
    pub fn cash_registers(&self) -> CashRegisterRepository {
        CashRegisterRepository::new(self.pool.clone())
    }

    /// Returns the document number allocator.
    pub fn sequences(&self) -> SequenceAllocator {
        SequenceAllocator::new(self.pool.clone())
    }

    /// Returns the customer repository.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// Returns the branch repository.
    pub fn branches(&self) -> BranchRepository {
        BranchRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_secs(1));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_config_defaults_from_empty_env() {
        let config = DbConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_reads_env() {
        let config = DbConfig::from_lookup(env(&[
            ("TIENDA_DATABASE_PATH", "/data/acme.db"),
            ("TIENDA_DB_MAX_CONNECTIONS", "12"),
            ("TIENDA_DB_BUSY_TIMEOUT_SECS", "9"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/acme.db"));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.busy_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert_eq!(
            DbConfig::from_lookup(env(&[("TIENDA_DB_MAX_CONNECTIONS", "zero")])).unwrap_err(),
            ConfigError::InvalidNumber {
                var: "TIENDA_DB_MAX_CONNECTIONS",
                value: "zero".to_string()
            }
        );
        assert!(DbConfig::from_lookup(env(&[("TIENDA_DB_BUSY_TIMEOUT_SECS", "0")])).is_err());
        assert!(DbConfig::from_lookup(env(&[("TIENDA_DATABASE_PATH", " ")])).is_err());
    }
}
