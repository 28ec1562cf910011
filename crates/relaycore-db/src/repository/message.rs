//! Secure message appender. Counter monotonicity is enforced by reading
//! `MAX(counter)` and inserting inside the same transaction, which takes a
//! row-level write lock on the target conversation and serializes
//! concurrent senders on the same (conversation, device).

use anyhow::Result;
use relaycore_common::models::message::{ListMessagesQuery, SecureMessage, VISIBLE_MSG_TYPES};
use sqlx::{Sqlite, SqlitePool, Transaction};

pub async fn max_counter_tx(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
    sender_account_digest: &str,
    sender_device_id: &str,
) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT MAX(counter) FROM messages_secure
        WHERE conversation_id = ? AND sender_account_digest = ? AND sender_device_id = ?
        "#,
    )
    .bind(conversation_id)
    .bind(sender_account_digest)
    .bind(sender_device_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.0.unwrap_or(0))
}

pub async fn max_counter(
    pool: &SqlitePool,
    conversation_id: &str,
    sender_account_digest: &str,
    sender_device_id: &str,
) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT MAX(counter) FROM messages_secure
        WHERE conversation_id = ? AND sender_account_digest = ? AND sender_device_id = ?
        "#,
    )
    .bind(conversation_id)
    .bind(sender_account_digest)
    .bind(sender_device_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0))
}

/// Insert the message row. A unique-constraint violation on `id` is the
/// caller's signal to treat this as idempotent success.
#[allow(clippy::too_many_arguments)]
pub async fn insert_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    conversation_id: &str,
    sender_account_digest: &str,
    sender_device_id: &str,
    receiver_account_digest: &str,
    receiver_device_id: Option<&str>,
    header_json: &str,
    ciphertext_b64: &str,
    counter: i64,
) -> Result<SecureMessage, sqlx::Error> {
    sqlx::query_as::<_, SecureMessage>(
        r#"
        INSERT INTO messages_secure
            (id, conversation_id, sender_account_digest, sender_device_id,
             receiver_account_digest, receiver_device_id, header_json, ciphertext_b64, counter)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(conversation_id)
    .bind(sender_account_digest)
    .bind(sender_device_id)
    .bind(receiver_account_digest)
    .bind(receiver_device_id)
    .bind(header_json)
    .bind(ciphertext_b64)
    .bind(counter)
    .fetch_one(&mut **tx)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<SecureMessage>> {
    let row = sqlx::query_as::<_, SecureMessage>("SELECT * FROM messages_secure WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_counter(
    pool: &SqlitePool,
    conversation_id: &str,
    sender_account_digest: &str,
    sender_device_id: &str,
    counter: i64,
) -> Result<Option<SecureMessage>> {
    let row = sqlx::query_as::<_, SecureMessage>(
        r#"
        SELECT * FROM messages_secure
        WHERE conversation_id = ? AND sender_account_digest = ? AND sender_device_id = ? AND counter = ?
        "#,
    )
    .bind(conversation_id)
    .bind(sender_account_digest)
    .bind(sender_device_id)
    .bind(counter)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

fn is_visible(header_json: &str) -> bool {
    let Ok(v) = serde_json::from_str::<serde_json::Value>(header_json) else {
        return true;
    };
    match v.pointer("/meta/msgType").and_then(|t| t.as_str()) {
        Some(t) => VISIBLE_MSG_TYPES.contains(&t),
        None => true,
    }
}

/// Oversamples raw rows (bounded by a small iteration cap) to deliver a
/// target number of *visible* rows, filtering hidden `msgType`s and any
/// row below the caller's deletion cursor.
pub async fn list(
    pool: &SqlitePool,
    query: &ListMessagesQuery,
    limit: i64,
    iteration_cap: u32,
    min_counter: i64,
) -> Result<(Vec<SecureMessage>, Option<i64>, Option<String>)> {
    let mut out: Vec<SecureMessage> = Vec::new();
    let mut cursor_counter = query.cursor_counter;
    let mut cursor_id = query.cursor_id.clone();
    let page_size = limit.max(1);

    for _ in 0..iteration_cap {
        if out.len() as i64 >= limit {
            break;
        }
        let rows = fetch_page(pool, &query.conversation_id, cursor_counter, cursor_id.as_deref(), page_size).await?;
        if rows.is_empty() {
            break;
        }
        let got = rows.len();
        for row in rows {
            cursor_counter = Some(row.counter);
            cursor_id = Some(row.id.clone());
            if row.counter <= min_counter {
                continue;
            }
            if is_visible(&row.header_json) {
                out.push(row);
                if out.len() as i64 >= limit {
                    break;
                }
            }
        }
        if (got as i64) < page_size {
            break;
        }
    }

    let next_counter = out.last().map(|r| r.counter);
    let next_id = out.last().map(|r| r.id.clone());
    Ok((out, next_counter, next_id))
}

async fn fetch_page(
    pool: &SqlitePool,
    conversation_id: &str,
    cursor_counter: Option<i64>,
    cursor_id: Option<&str>,
    limit: i64,
) -> Result<Vec<SecureMessage>> {
    let rows = match (cursor_counter, cursor_id) {
        (Some(ctr), Some(id)) => {
            sqlx::query_as::<_, SecureMessage>(
                r#"
                SELECT * FROM messages_secure
                WHERE conversation_id = ? AND (counter, id) < (?, ?)
                ORDER BY counter DESC, created_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(conversation_id)
            .bind(ctr)
            .bind(id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, SecureMessage>(
                r#"
                SELECT * FROM messages_secure
                WHERE conversation_id = ?
                ORDER BY counter DESC, created_at DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

pub async fn delete_by_id(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM messages_secure WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    // The legacy `messages` table is a no-op delete target.
    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_conversation(pool: &SqlitePool, conversation_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM messages_secure WHERE conversation_id = ?")
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM conversations WHERE conversation_id = ?")
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
