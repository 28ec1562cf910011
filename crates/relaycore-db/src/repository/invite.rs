//! Invite dropbox state machine. Transitions are guarded by
//! `WHERE invite_id = ? AND status = <expected>`; a zero-row result means
//! "lost the race" and the caller maps it to the appropriate 409/410.

use anyhow::Result;
use relaycore_common::models::invite::InviteDropbox;
use sqlx::SqlitePool;

pub async fn find(pool: &SqlitePool, invite_id: &str) -> Result<Option<InviteDropbox>> {
    let row = sqlx::query_as::<_, InviteDropbox>("SELECT * FROM invite_dropbox WHERE invite_id = ?")
        .bind(invite_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn create(
    pool: &SqlitePool,
    invite_id: &str,
    owner_account_digest: &str,
    owner_device_id: &str,
    owner_public_key_b64: &str,
    expires_at: i64,
) -> Result<InviteDropbox, sqlx::Error> {
    sqlx::query_as::<_, InviteDropbox>(
        r#"
        INSERT INTO invite_dropbox
            (invite_id, owner_account_digest, owner_device_id, owner_public_key_b64, expires_at, status)
        VALUES (?, ?, ?, ?, ?, 'CREATED')
        RETURNING *
        "#,
    )
    .bind(invite_id)
    .bind(owner_account_digest)
    .bind(owner_device_id)
    .bind(owner_public_key_b64)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

/// Returns `true` iff this call performed the CREATED -> DELIVERED
/// transition (lost races return `false`).
pub async fn deliver(
    pool: &SqlitePool,
    invite_id: &str,
    delivered_by_account_digest: &str,
    delivered_by_device_id: &str,
    envelope_json: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE invite_dropbox
        SET status = 'DELIVERED',
            delivered_by_account_digest = ?,
            delivered_by_device_id = ?,
            delivered_at = strftime('%s','now'),
            ciphertext_json = ?,
            updated_at = strftime('%s','now')
        WHERE invite_id = ? AND status = 'CREATED' AND expires_at > strftime('%s','now')
        "#,
    )
    .bind(delivered_by_account_digest)
    .bind(delivered_by_device_id)
    .bind(envelope_json)
    .bind(invite_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// DELIVERED -> CONSUMED, owner-only. Idempotent: calling this again on an
/// already-CONSUMED row is a no-op; the caller re-reads the stored envelope.
pub async fn consume(pool: &SqlitePool, invite_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE invite_dropbox
        SET status = 'CONSUMED', consumed_at = strftime('%s','now'), updated_at = strftime('%s','now')
        WHERE invite_id = ? AND status = 'DELIVERED'
        "#,
    )
    .bind(invite_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Promote an expired, non-terminal row to EXPIRED before a status read
/// replies.
pub async fn promote_expired(pool: &SqlitePool, invite_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE invite_dropbox
        SET status = 'EXPIRED', updated_at = strftime('%s','now')
        WHERE invite_id = ? AND status NOT IN ('CONSUMED', 'EXPIRED') AND expires_at <= strftime('%s','now')
        "#,
    )
    .bind(invite_id)
    .execute(pool)
    .await?;
    Ok(())
}
