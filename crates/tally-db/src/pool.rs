//! # Pool and Connection Settings
//!
//! How the engine reaches its SQLite file, and how concurrent checkouts
//! share it.
//!
//! ## Writers and Readers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig (builder or TALLY_DB_* env)                                   │
//! │       │ connect_options(): WAL, synchronous=NORMAL, foreign_keys=ON,    │
//! │       │                    busy_timeout                                 │
//! │       ▼                                                                 │
//! │  Database ──► SqlitePool (max_connections)                              │
//! │                 │                                                       │
//! │     checkout A ─┼─► pre-check reads ─────── any connection, no lock     │
//! │                 └─► unit of work ────────── first UPDATE takes the      │
//! │     checkout B ───► unit of work ─────┐     write lock                  │
//! │                                       └──── waits up to busy_timeout,   │
//! │                                             then SQLITE_BUSY            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An in-memory database lives exactly as long as its single connection, so
//! [`DbConfig::in_memory`] pins that connection open.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

/// Path used when neither `--db` nor `TALLY_DB_PATH` is given.
pub const DEFAULT_DB_PATH: &str = "./tally_dev.db";

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives and how the pool treats it.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tally/shop.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections (default 5).
    pub max_connections: u32,

    /// Connections kept open while idle (default 1).
    pub min_connections: u32,

    /// How long `acquire` waits for a free connection (default 30s).
    pub connect_timeout: Duration,

    /// Idle connections above `min_connections` are closed after this.
    /// `None` keeps them forever.
    pub idle_timeout: Option<Duration>,

    /// How long a writer waits for the SQLite write lock (default 5s).
    pub busy_timeout: Duration,

    /// Apply pending migrations in [`Database::new`] (default true).
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed configuration. The file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private, migrated in-memory database on one pinned connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            idle_timeout: None,
            connect_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    /// Reads `TALLY_DB_PATH`, `TALLY_DB_MAX_CONNECTIONS` and
    /// `TALLY_DB_BUSY_TIMEOUT_MS`; unset variables keep their defaults.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) against an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let mut config = DbConfig::new(lookup("TALLY_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));

        if let Some(raw) = lookup("TALLY_DB_MAX_CONNECTIONS") {
            let max: u32 = raw.trim().parse().map_err(|_| {
                DbError::InvalidConfig(format!("TALLY_DB_MAX_CONNECTIONS must be a positive integer, got {raw:?}"))
            })?;
            if max == 0 {
                return Err(DbError::InvalidConfig(
                    "TALLY_DB_MAX_CONNECTIONS must be at least 1".to_string(),
                ));
            }
            config.max_connections = max;
        }

        if let Some(raw) = lookup("TALLY_DB_BUSY_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                DbError::InvalidConfig(format!("TALLY_DB_BUSY_TIMEOUT_MS must be milliseconds, got {raw:?}"))
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    /// SQLite options every pooled connection is opened with.
    pub fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let base = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
        };

        Ok(base
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the pool plus repository accessors.
///
/// Clones share the pool. Also the [`tally_core::InventoryStore`] the engine
/// runs against (see [`crate::store`]).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening database"
        );

        let options = config.connect_options()?;
        debug!(busy_timeout = ?config.busy_timeout, in_memory = config.is_in_memory(), "Connection options ready");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        if config.is_in_memory() {
            // Recycling the only connection would drop the database with it
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations, then checks the immutability triggers.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        migrations::verify_guards(&self.pool).await?;
        info!("Schema up to date");
        Ok(())
    }

    /// The raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// The append-only stock ledger.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Closes every connection; later calls fail.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
