//! Contact-secret backup: monotonic `version`, a `withDrState` regression
//! guard, and trim-to-N retention ordered by `(updated_at DESC, id DESC)`.

use anyhow::Result;
use relaycore_common::models::backup::ContactSecretsBackup;
use sqlx::SqlitePool;

pub async fn max_with_dr_state(pool: &SqlitePool, account_digest: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT MAX(with_dr_state) FROM contact_secret_backups WHERE account_digest = ?",
    )
    .bind(account_digest)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0))
}

pub async fn next_version(pool: &SqlitePool, account_digest: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT MAX(version) FROM contact_secret_backups WHERE account_digest = ?",
    )
    .bind(account_digest)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0) + 1)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &SqlitePool,
    account_digest: &str,
    version: i64,
    payload_json: &str,
    with_dr_state: i64,
    device_label: Option<&str>,
    device_id: Option<&str>,
) -> Result<ContactSecretsBackup, sqlx::Error> {
    sqlx::query_as::<_, ContactSecretsBackup>(
        r#"
        INSERT INTO contact_secret_backups
            (account_digest, version, payload_json, with_dr_state, device_label, device_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING account_digest, version, payload_json as blob_b64, created_at, updated_at
        "#,
    )
    .bind(account_digest)
    .bind(version)
    .bind(payload_json)
    .bind(with_dr_state)
    .bind(device_label)
    .bind(device_id)
    .fetch_one(pool)
    .await
}

/// Keep only the `retain` rows with largest `(updated_at, id)`; delete the
/// rest.
pub async fn trim(pool: &SqlitePool, account_digest: &str, retain: i64) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM contact_secret_backups
        WHERE account_digest = ? AND id NOT IN (
            SELECT id FROM contact_secret_backups
            WHERE account_digest = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT ?
        )
        "#,
    )
    .bind(account_digest)
    .bind(account_digest)
    .bind(retain)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list(
    pool: &SqlitePool,
    account_digest: &str,
    limit: i64,
) -> Result<Vec<ContactSecretsBackup>> {
    let rows = sqlx::query_as::<_, ContactSecretsBackup>(
        r#"
        SELECT account_digest, version, payload_json as blob_b64, created_at, updated_at
        FROM contact_secret_backups
        WHERE account_digest = ?
        ORDER BY updated_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(account_digest)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_version(
    pool: &SqlitePool,
    account_digest: &str,
    version: i64,
) -> Result<Option<ContactSecretsBackup>> {
    let row = sqlx::query_as::<_, ContactSecretsBackup>(
        r#"
        SELECT account_digest, version, payload_json as blob_b64, created_at, updated_at
        FROM contact_secret_backups
        WHERE account_digest = ? AND version = ?
        "#,
    )
    .bind(account_digest)
    .bind(version)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
