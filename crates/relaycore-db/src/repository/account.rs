//! Account resolver — lookup-or-create with collision recovery, and the
//! `tags/exchange` replay counter.

use anyhow::Result;
use relaycore_common::models::account::Account;
use sqlx::SqlitePool;

pub async fn find_by_digest(pool: &SqlitePool, account_digest: &str) -> Result<Option<Account>> {
    let row = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_digest = ?")
        .bind(account_digest)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_uid_digest(pool: &SqlitePool, uid_digest: &str) -> Result<Option<Account>> {
    let row = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE uid_digest = ?")
        .bind(uid_digest)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Insert a freshly minted account. On a unique-violation (lost the race
/// against a concurrent creator) the caller should re-select rather than
/// treat this as fatal.
pub async fn insert_new(
    pool: &SqlitePool,
    account_digest: &str,
    account_token: &str,
    uid_digest: &str,
) -> Result<Account> {
    let row = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (account_digest, account_token, uid_digest, last_ctr)
        VALUES (?, ?, ?, 0)
        RETURNING *
        "#,
    )
    .bind(account_digest)
    .bind(account_token)
    .bind(uid_digest)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Enforce the replay check and advance `last_ctr` in one statement: the
/// `WHERE ctr > last_ctr` makes a stale write a no-op rather than a race.
pub async fn advance_ctr_if_greater(
    pool: &SqlitePool,
    account_digest: &str,
    ctr: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET last_ctr = ?, updated_at = strftime('%s','now')
        WHERE account_digest = ? AND ? > last_ctr
        "#,
    )
    .bind(ctr)
    .bind(account_digest)
    .bind(ctr)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn store_wrapped_mk(
    pool: &SqlitePool,
    account_digest: &str,
    wrapped_mk_json: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET wrapped_mk_json = ?, updated_at = strftime('%s','now') WHERE account_digest = ?",
    )
    .bind(wrapped_mk_json)
    .bind(account_digest)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn store_opaque_envelope(
    pool: &SqlitePool,
    account_digest: &str,
    opaque_envelope: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET opaque_envelope = ?, updated_at = strftime('%s','now') WHERE account_digest = ?",
    )
    .bind(opaque_envelope)
    .bind(account_digest)
    .execute(pool)
    .await?;
    Ok(())
}
