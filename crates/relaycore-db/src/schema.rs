//! Boot-time schema readiness probe.
//!
//! Migrations are the source of truth, but a handler that assumes a column
//! exists and gets a driver-level "no such column" error is a confusing way
//! to fail. Probe the handful of columns every component leans on and abort
//! with a clear message if one is missing.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

const REQUIRED_COLUMNS: &[(&str, &str)] = &[
    ("accounts", "wrapped_mk_json"),
    ("invite_dropbox", "updated_at"),
    ("message_key_vault", "dr_state_snapshot"),
];

pub async fn verify(pool: &SqlitePool) -> Result<()> {
    let mut missing = Vec::new();
    for (table, column) in REQUIRED_COLUMNS {
        if !column_exists(pool, table, column).await? {
            missing.push(format!("{table}.{column}"));
        }
    }
    if !missing.is_empty() {
        bail!("schema missing required columns: {}", missing.join(", "));
    }
    Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    #[derive(sqlx::FromRow)]
    struct PragmaRow {
        name: String,
    }

    let rows: Vec<PragmaRow> =
        sqlx::query_as(&format!("PRAGMA table_info({table})"))
            .fetch_all(pool)
            .await?;
    Ok(rows.iter().any(|r| r.name == column))
}
