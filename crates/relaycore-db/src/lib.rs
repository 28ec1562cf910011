//! # relaycore-db
//!
//! Database layer for relaycore — embedded SQLite, no external services
//! required. A single `SqlitePool` backs every repository module; the pool
//! runs WAL mode with a busy timeout so concurrent admission/claim/send
//! traffic doesn't trip `SQLITE_BUSY`.

pub mod repository;
pub mod schema;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Connect using the URL in `config.database.url`.
    pub async fn connect(config: &relaycore_common::config::AppConfig) -> Result<Self> {
        tracing::info!(url = %config.database.url, "connecting to SQLite");

        let opts = SqliteConnectOptions::from_str(&config.database.url)
            .with_context(|| format!("invalid database url: {}", config.database.url))?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(config.database.busy_timeout_secs))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(opts)
            .await
            .context("failed to open sqlite pool")?;

        Ok(Self { pool })
    }

    /// Run migrations, then verify the schema carries every column the
    /// request handlers assume is present.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        schema::verify(&self.pool).await?;
        tracing::info!("migrations complete");
        Ok(())
    }
}
