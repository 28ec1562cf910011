//! Message-key vault writes are upserts with `ON CONFLICT DO NOTHING` on
//! the full primary key: a sender retry or a receiver re-fetch must not
//! fail, but the server never silently replaces an existing wrapped key.

use anyhow::Result;
use relaycore_common::models::vault::VaultEntry;
use sqlx::{Sqlite, SqlitePool, Transaction};

#[allow(clippy::too_many_arguments)]
pub async fn upsert_tx(
    tx: &mut Transaction<'_, Sqlite>,
    account_digest: &str,
    conversation_id: &str,
    message_id: &str,
    device_id: &str,
    direction: &str,
    wrapped_key_b64: &str,
    wrap_context: &str,
    dr_state_snapshot: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO message_key_vault
            (account_digest, conversation_id, message_id, sender_device_id, direction,
             wrapped_mk_json, wrap_context_json, dr_state_snapshot)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (account_digest, conversation_id, message_id, sender_device_id) DO NOTHING
        "#,
    )
    .bind(account_digest)
    .bind(conversation_id)
    .bind(message_id)
    .bind(device_id)
    .bind(direction)
    .bind(wrapped_key_b64)
    .bind(wrap_context)
    .bind(dr_state_snapshot)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &SqlitePool,
    account_digest: &str,
    conversation_id: &str,
    message_id: &str,
    device_id: &str,
    direction: &str,
    wrapped_key_b64: &str,
    wrap_context: &str,
    dr_state_snapshot: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO message_key_vault
            (account_digest, conversation_id, message_id, sender_device_id, direction,
             wrapped_mk_json, wrap_context_json, dr_state_snapshot)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (account_digest, conversation_id, message_id, sender_device_id) DO NOTHING
        "#,
    )
    .bind(account_digest)
    .bind(conversation_id)
    .bind(message_id)
    .bind(device_id)
    .bind(direction)
    .bind(wrapped_key_b64)
    .bind(wrap_context)
    .bind(dr_state_snapshot)
    .execute(pool)
    .await?;
    Ok(())
}

const SELECT_COLUMNS: &str = r#"
    message_id, conversation_id, account_digest, sender_device_id as device_id, direction,
    wrapped_mk_json as wrapped_key_b64, wrap_context_json as wrap_context, dr_state_snapshot, created_at
"#;

pub async fn find_by_message_id(
    pool: &SqlitePool,
    account_digest: &str,
    conversation_id: &str,
    message_id: &str,
) -> Result<Option<VaultEntry>> {
    let row = sqlx::query_as::<_, VaultEntry>(&format!(
        "SELECT {SELECT_COLUMNS} FROM message_key_vault WHERE account_digest = ? AND conversation_id = ? AND message_id = ?",
    ))
    .bind(account_digest)
    .bind(conversation_id)
    .bind(message_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

const SELECT_COLUMNS_JOINED: &str = r#"
    mkv.message_id, mkv.conversation_id, mkv.account_digest, mkv.sender_device_id as device_id, mkv.direction,
    mkv.wrapped_mk_json as wrapped_key_b64, mkv.wrap_context_json as wrap_context, mkv.dr_state_snapshot, mkv.created_at
"#;

pub async fn find_by_header_counter(
    pool: &SqlitePool,
    account_digest: &str,
    conversation_id: &str,
    header_counter: i64,
) -> Result<Option<VaultEntry>> {
    let row = sqlx::query_as::<_, VaultEntry>(&format!(
        r#"
        SELECT {SELECT_COLUMNS_JOINED} FROM message_key_vault mkv
        JOIN messages_secure ms ON ms.id = mkv.message_id
        WHERE mkv.account_digest = ? AND mkv.conversation_id = ? AND ms.counter = ?
        "#,
    ))
    .bind(account_digest)
    .bind(conversation_id)
    .bind(header_counter)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Most recent outgoing and most recent incoming DR snapshot — the
/// ratchet-resume read path.
pub async fn latest_state(
    pool: &SqlitePool,
    account_digest: &str,
    conversation_id: &str,
    sender_device_id: Option<&str>,
) -> Result<(Option<VaultEntry>, Option<VaultEntry>)> {
    let outgoing = match sender_device_id {
        Some(device_id) => {
            sqlx::query_as::<_, VaultEntry>(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM message_key_vault
                WHERE account_digest = ? AND conversation_id = ? AND direction = 'send' AND sender_device_id = ?
                ORDER BY created_at DESC LIMIT 1
                "#,
            ))
            .bind(account_digest)
            .bind(conversation_id)
            .bind(device_id)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, VaultEntry>(&format!(
                r#"
                SELECT {SELECT_COLUMNS} FROM message_key_vault
                WHERE account_digest = ? AND conversation_id = ? AND direction = 'send'
                ORDER BY created_at DESC LIMIT 1
                "#,
            ))
            .bind(account_digest)
            .bind(conversation_id)
            .fetch_optional(pool)
            .await?
        }
    };

    let incoming = sqlx::query_as::<_, VaultEntry>(&format!(
        r#"
        SELECT {SELECT_COLUMNS} FROM message_key_vault
        WHERE account_digest = ? AND conversation_id = ? AND direction = 'recv'
        ORDER BY created_at DESC LIMIT 1
        "#,
    ))
    .bind(account_digest)
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok((outgoing, incoming))
}

pub async fn delete_by_message_id(
    pool: &SqlitePool,
    account_digest: &str,
    conversation_id: &str,
    message_id: &str,
) -> Result<()> {
    sqlx::query(
        "DELETE FROM message_key_vault WHERE account_digest = ? AND conversation_id = ? AND message_id = ?",
    )
    .bind(account_digest)
    .bind(conversation_id)
    .bind(message_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool, account_digest: &str, conversation_id: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM message_key_vault WHERE account_digest = ? AND conversation_id = ?",
    )
    .bind(account_digest)
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
