//! Token redemption and account purge.

use anyhow::Result;
use sqlx::SqlitePool;

pub struct TokenRow {
    pub status: String,
    pub used_at: Option<i64>,
    pub used_by_digest: Option<String>,
}

pub async fn find_token(pool: &SqlitePool, token_id: &str) -> Result<Option<TokenRow>> {
    let row: Option<(String, Option<i64>, Option<String>)> = sqlx::query_as(
        "SELECT status, used_at, used_by_digest FROM tokens WHERE token_id = ?",
    )
    .bind(token_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(status, used_at, used_by_digest)| TokenRow {
        status,
        used_at,
        used_by_digest,
    }))
}

pub async fn current_expiry(pool: &SqlitePool, digest: &str) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT expires_at FROM subscriptions WHERE digest = ?")
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(e,)| e).unwrap_or(0))
}

/// Upsert subscription, mark token used, append extend log — one
/// transaction, all three succeed or all fail.
#[allow(clippy::too_many_arguments)]
pub async fn redeem(
    pool: &SqlitePool,
    digest: &str,
    new_expires: i64,
    token_id: &str,
    issued_at: i64,
    extend_days: i64,
    nonce: &str,
    key_id: &str,
    signature_b64: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO subscriptions (digest, expires_at, updated_at)
        VALUES (?, ?, strftime('%s','now'))
        ON CONFLICT (digest) DO UPDATE SET
            expires_at = excluded.expires_at,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(digest)
    .bind(new_expires)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO tokens (token_id, digest, issued_at, extend_days, nonce, key_id, signature_b64, status, used_at, used_by_digest)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'used', strftime('%s','now'), ?)
        ON CONFLICT (token_id) DO UPDATE SET
            status = 'used',
            used_at = strftime('%s','now'),
            used_by_digest = excluded.used_by_digest
        "#,
    )
    .bind(token_id)
    .bind(digest)
    .bind(issued_at)
    .bind(extend_days)
    .bind(nonce)
    .bind(key_id)
    .bind(signature_b64)
    .bind(digest)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO extend_logs (digest, token_id, new_expires) VALUES (?, ?, ?)",
    )
    .bind(digest)
    .bind(token_id)
    .bind(new_expires)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn subscription_status(pool: &SqlitePool, digest: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT expires_at FROM subscriptions WHERE digest = ?")
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(e,)| e))
}

/// Per-table delete covering every table named in the purge contract.
/// Best-effort: logs but does not abort on an individual table failure.
pub async fn purge_account(pool: &SqlitePool, account_digest: &str) -> Vec<(String, i64)> {
    let statements: &[(&str, &str)] = &[
        ("messages_secure (sender)", "DELETE FROM messages_secure WHERE sender_account_digest = ?"),
        ("messages_secure (receiver)", "DELETE FROM messages_secure WHERE receiver_account_digest = ?"),
        ("conversation_acl", "DELETE FROM conversation_acl WHERE account_digest = ?"),
        ("call_sessions", "DELETE FROM call_sessions WHERE caller_account_digest = ?"),
        ("call_events", "DELETE FROM call_events WHERE account_digest = ?"),
        ("contact_secret_backups", "DELETE FROM contact_secret_backups WHERE account_digest = ?"),
        ("message_key_vault", "DELETE FROM message_key_vault WHERE account_digest = ?"),
        ("invite_dropbox (owner)", "DELETE FROM invite_dropbox WHERE owner_account_digest = ?"),
        ("tokens", "DELETE FROM tokens WHERE used_by_digest = ?"),
        ("subscriptions", "DELETE FROM subscriptions WHERE digest = ?"),
        ("extend_logs", "DELETE FROM extend_logs WHERE digest = ?"),
        ("signed_prekeys", "DELETE FROM signed_prekeys WHERE account_digest = ?"),
        ("one_time_prekeys", "DELETE FROM one_time_prekeys WHERE account_digest = ?"),
        ("media_usage", "DELETE FROM media_usage WHERE account_digest = ?"),
        ("devices", "DELETE FROM devices WHERE account_digest = ?"),
        ("accounts", "DELETE FROM accounts WHERE account_digest = ?"),
    ];

    let mut results = Vec::with_capacity(statements.len());
    for (name, sql) in statements {
        match sqlx::query(sql).bind(account_digest).execute(pool).await {
            Ok(r) => results.push((name.to_string(), r.rows_affected() as i64)),
            Err(err) => {
                tracing::warn!(table = %name, error = %err, "purge step failed, continuing");
                results.push((name.to_string(), 0));
            }
        }
    }
    results
}
