use anyhow::Result;
use relaycore_common::models::device::Device;
use sqlx::SqlitePool;

pub async fn upsert(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
    label: Option<&str>,
) -> Result<Device> {
    let row = sqlx::query_as::<_, Device>(
        r#"
        INSERT INTO devices (account_digest, device_id, label, last_seen_at)
        VALUES (?, ?, ?, strftime('%s','now'))
        ON CONFLICT (account_digest, device_id) DO UPDATE SET
            label = COALESCE(excluded.label, devices.label),
            last_seen_at = strftime('%s','now'),
            updated_at = strftime('%s','now')
        RETURNING *
        "#,
    )
    .bind(account_digest)
    .bind(device_id)
    .bind(label)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
) -> Result<Option<Device>> {
    let row = sqlx::query_as::<_, Device>(
        "SELECT * FROM devices WHERE account_digest = ? AND device_id = ?",
    )
    .bind(account_digest)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Most recently updated device for an account — used when a prekey
/// bundle fetch doesn't specify a device.
pub async fn most_recent(pool: &SqlitePool, account_digest: &str) -> Result<Option<Device>> {
    let row = sqlx::query_as::<_, Device>(
        "SELECT * FROM devices WHERE account_digest = ? ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(account_digest)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn store_device_key(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
    device_key_json: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE devices SET device_key_json = ?, updated_at = strftime('%s','now') WHERE account_digest = ? AND device_id = ?",
    )
    .bind(device_key_json)
    .bind(account_digest)
    .bind(device_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_active(pool: &SqlitePool, account_digest: &str, device_id: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT status FROM devices WHERE account_digest = ? AND device_id = ?",
    )
    .bind(account_digest)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(status,)| status == "active").unwrap_or(false))
}
