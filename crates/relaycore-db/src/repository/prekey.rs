//! Signed prekeys and one-time prekeys. The bundle fetch's OPK consume is
//! the serialization point that guarantees at-most-one handout: the
//! `UPDATE ... WHERE opk_id = (SELECT ... LIMIT 1) RETURNING` runs as one
//! statement, so two concurrent fetchers never observe the same row.

use anyhow::Result;
use relaycore_common::models::prekey::{OneTimePrekey, OpkUpload, SignedPrekey};
use sqlx::SqlitePool;

pub async fn upsert_signed_prekey(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
    spk_id: i64,
    spk_pub: &str,
    spk_sig: &str,
    ik_pub: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO signed_prekeys (account_digest, device_id, spk_id, spk_pub, spk_sig, ik_pub)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (account_digest, device_id, spk_id) DO UPDATE SET
            spk_pub = excluded.spk_pub,
            spk_sig = excluded.spk_sig,
            ik_pub = COALESCE(signed_prekeys.ik_pub, excluded.ik_pub)
        "#,
    )
    .bind(account_digest)
    .bind(device_id)
    .bind(spk_id)
    .bind(spk_pub)
    .bind(spk_sig)
    .bind(ik_pub)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_one_time_prekeys(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
    opks: &[OpkUpload],
) -> Result<()> {
    for opk in opks {
        sqlx::query(
            r#"
            INSERT INTO one_time_prekeys (account_digest, device_id, opk_id, opk_pub)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (account_digest, device_id, opk_id) DO NOTHING
            "#,
        )
        .bind(account_digest)
        .bind(device_id)
        .bind(opk.opk_id)
        .bind(&opk.opk_pub)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn next_opk_id(pool: &SqlitePool, account_digest: &str, device_id: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT MAX(opk_id) FROM one_time_prekeys WHERE account_digest = ? AND device_id = ?",
    )
    .bind(account_digest)
    .bind(device_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0) + 1)
}

pub async fn most_recent_signed_prekey(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
) -> Result<Option<SignedPrekey>> {
    let row = sqlx::query_as::<_, SignedPrekey>(
        r#"
        SELECT * FROM signed_prekeys
        WHERE account_digest = ? AND device_id = ?
        ORDER BY spk_id DESC LIMIT 1
        "#,
    )
    .bind(account_digest)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Atomically consume the lowest-id unconsumed OPK for a device.
pub async fn consume_one_time_prekey(
    pool: &SqlitePool,
    account_digest: &str,
    device_id: &str,
) -> Result<Option<OneTimePrekey>> {
    let row = sqlx::query_as::<_, OneTimePrekey>(
        r#"
        UPDATE one_time_prekeys
        SET consumed_at = strftime('%s','now')
        WHERE account_digest = ? AND device_id = ? AND opk_id = (
            SELECT opk_id FROM one_time_prekeys
            WHERE account_digest = ? AND device_id = ? AND consumed_at IS NULL
            ORDER BY opk_id ASC
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(account_digest)
    .bind(device_id)
    .bind(account_digest)
    .bind(device_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
