//! Database connection pool management.

use async_trait::async_trait;
use shaku::Component;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Sqlite, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tessera_config::DatabaseConfig;
use tessera_core::{Interface, TesseraError, TesseraResult};
use tracing::{info, warn};

/// Interface for database pool operations.
///
/// Every DAO receives the pool through this trait so the pool can be
/// injected by the DI module or wrapped around a test database.
#[async_trait]
pub trait DatabasePoolInterface: Interface + Send + Sync {
    /// Returns a reference to the underlying SQLite pool.
    fn inner(&self) -> &SqlitePool;

    /// Opens a transaction that holds the database write lock from the start.
    ///
    /// A deferred transaction that reads before it writes cannot wait for a
    /// concurrent writer and fails with `SQLITE_BUSY` instead.
    async fn begin_write(&self) -> TesseraResult<Transaction<'static, Sqlite>> {
        Ok(self.inner().begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Checks if the database connection is healthy.
    async fn health_check(&self) -> TesseraResult<()>;

    /// Applies the embedded schema migrations.
    async fn run_migrations(&self) -> TesseraResult<()>;

    /// Closes the database pool.
    async fn close(&self);
}

/// Database pool wrapper.
#[derive(Component)]
#[shaku(interface = DatabasePoolInterface)]
pub struct DatabasePool {
    #[shaku(no_default)]
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens a pool from configuration.
    ///
    /// Connections run with foreign keys enforced, a busy timeout, and WAL
    /// journaling for file databases.
    ///
    /// An in-memory database is dropped with its last connection, so an
    /// in-memory pool is pinned to one connection that is never recycled.
    pub async fn new(config: &DatabaseConfig) -> TesseraResult<Self> {
        info!("Connecting to SQLite database: {}", config.url);

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| TesseraError::Configuration(format!("Invalid database URL: {e}")))?
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout())
            .create_if_missing(config.create_if_missing);
        if !config.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }
        if !config.log_queries {
            options = options.disable_statement_logging();
        }

        let pool_options = if config.is_in_memory() {
            if config.max_connections > 1 {
                warn!(
                    "In-memory database ignores max_connections = {}, using a single connection",
                    config.max_connections
                );
            }
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .min_connections(config.min_connections)
                .max_connections(config.max_connections)
                .idle_timeout(config.idle_timeout())
        };

        let pool = pool_options
            .acquire_timeout(config.connect_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                TesseraError::Datastore(format!("Failed to connect: {e}"))
            })?;

        info!("SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Wraps an already opened pool.
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Alias for [`new`](Self::new).
    pub async fn connect(config: &DatabaseConfig) -> TesseraResult<Self> {
        Self::new(config).await
    }
}

#[async_trait]
impl DatabasePoolInterface for DatabasePool {
    fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    async fn health_check(&self) -> TesseraResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| TesseraError::Datastore(format!("Health check failed: {e}")))?;
        Ok(())
    }

    async fn run_migrations(&self) -> TesseraResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TesseraError::Datastore(format!("Migration failed: {e}")))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn close(&self) {
        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}

/// Opens a shared pool and applies migrations.
pub async fn create_pool(config: &DatabaseConfig) -> TesseraResult<Arc<DatabasePool>> {
    let pool = DatabasePool::new(config).await?;
    pool.run_migrations().await?;
    Ok(Arc::new(pool))
}
