use anyhow::Result;
use relaycore_common::models::deletion::DeletionLogEntry;
use sqlx::SqlitePool;

/// Monotonic advance of `min_counter`; a lower value is silently ignored.
pub async fn advance_cursor(
    pool: &SqlitePool,
    conversation_id: &str,
    account_digest: &str,
    min_counter: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO deletion_cursors (conversation_id, account_digest, min_counter, updated_at)
        VALUES (?, ?, ?, strftime('%s','now'))
        ON CONFLICT (conversation_id, account_digest) DO UPDATE SET
            min_counter = excluded.min_counter,
            updated_at = strftime('%s','now')
        WHERE excluded.min_counter > deletion_cursors.min_counter
        "#,
    )
    .bind(conversation_id)
    .bind(account_digest)
    .bind(min_counter)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn cursor_for(
    pool: &SqlitePool,
    conversation_id: &str,
    account_digest: &str,
) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT min_counter FROM deletion_cursors WHERE conversation_id = ? AND account_digest = ?",
    )
    .bind(conversation_id)
    .bind(account_digest)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(c,)| c).unwrap_or(0))
}

pub async fn append_log(
    pool: &SqlitePool,
    owner_digest: &str,
    conversation_id: &str,
    encrypted_checkpoint: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO conversation_deletion_log (owner_digest, conversation_id, encrypted_checkpoint) VALUES (?, ?, ?)",
    )
    .bind(owner_digest)
    .bind(conversation_id)
    .bind(encrypted_checkpoint)
    .execute(pool)
    .await?;
    Ok(())
}

/// All tombstones for a conversation since a given log id, regardless of
/// which account's delete produced them — the shape the cross-conversation
/// sync read path queries by.
pub async fn read_log_for_conversation(
    pool: &SqlitePool,
    conversation_id: &str,
    since_id: i64,
) -> Result<Vec<DeletionLogEntry>> {
    let rows = sqlx::query_as::<_, DeletionLogEntry>(
        r#"
        SELECT id, owner_digest, conversation_id, encrypted_checkpoint, created_at
        FROM conversation_deletion_log
        WHERE conversation_id = ? AND id > ?
        ORDER BY id ASC
        "#,
    )
    .bind(conversation_id)
    .bind(since_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Tombstone log scoped to a single owning account, as the multi-device
/// sync endpoint reads it.
pub async fn read_log(
    pool: &SqlitePool,
    owner_digest: &str,
    conversation_id: &str,
    since_id: i64,
) -> Result<Vec<DeletionLogEntry>> {
    let rows = sqlx::query_as::<_, DeletionLogEntry>(
        r#"
        SELECT id, owner_digest, conversation_id, encrypted_checkpoint, created_at
        FROM conversation_deletion_log
        WHERE owner_digest = ? AND conversation_id = ? AND id > ?
        ORDER BY id ASC
        "#,
    )
    .bind(owner_digest)
    .bind(conversation_id)
    .bind(since_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
