/// Database module for SQLite persistence
///
/// Backs the live Warm tier backend and the Cold tier archive. It uses sqlx
/// with WAL mode for concurrent readers alongside the background archiver.
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        Self::connect(&format!("sqlite:{}", db_path.display()), None).await
    }

    /// Connect to a database URL, optionally bounding the connect time.
    ///
    /// An unreachable database surfaces as an error within `acquire_timeout`
    /// instead of blocking, which is what the Warm tier probe relies on.
    pub async fn connect(url: &str, acquire_timeout: Option<Duration>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if let Some(timeout) = acquire_timeout {
            pool_options = pool_options.acquire_timeout(timeout);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// In-memory database with the full schema, used by tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    ///
    /// Migrations are idempotent and can be run multiple times safely.
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_warm_memory.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_warm_memory.sql")?;

        sqlx::raw_sql(include_str!("../../migrations/002_cold_archive.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 002_cold_archive.sql")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    /// Checkpoint the WAL and close all connections.
    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        self.pool.close().await;
        Ok(())
    }
}
