use anyhow::Result;
use relaycore_common::models::conversation::ConversationAcl;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub async fn ensure_conversation(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO conversations (conversation_id) VALUES (?) ON CONFLICT DO NOTHING")
        .bind(conversation_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// SQLite treats NULL as distinct from NULL under a UNIQUE/PRIMARY KEY
// index, so an `ON CONFLICT (.., device_id)` target would never fire for
// two "any device" rows (device_id = NULL) and would insert duplicates
// instead of updating. Store "any device" as an empty string so the
// conflict target actually collapses them.
fn device_id_key(device_id: Option<&str>) -> &str {
    device_id.unwrap_or("")
}

pub async fn upsert_acl_tx(
    tx: &mut Transaction<'_, Sqlite>,
    conversation_id: &str,
    account_digest: &str,
    device_id: Option<&str>,
    role: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_acl (conversation_id, account_digest, device_id, role, updated_at)
        VALUES (?, ?, ?, ?, strftime('%s','now'))
        ON CONFLICT (conversation_id, account_digest, device_id) DO UPDATE SET
            role = excluded.role,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(conversation_id)
    .bind(account_digest)
    .bind(device_id_key(device_id))
    .bind(role)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_acl(
    pool: &SqlitePool,
    conversation_id: &str,
    account_digest: &str,
    device_id: Option<&str>,
    role: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_acl (conversation_id, account_digest, device_id, role, updated_at)
        VALUES (?, ?, ?, ?, strftime('%s','now'))
        ON CONFLICT (conversation_id, account_digest, device_id) DO UPDATE SET
            role = excluded.role,
            updated_at = strftime('%s','now')
        "#,
    )
    .bind(conversation_id)
    .bind(account_digest)
    .bind(device_id_key(device_id))
    .bind(role)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_member(
    pool: &SqlitePool,
    conversation_id: &str,
    account_digest: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM conversation_acl WHERE conversation_id = ? AND account_digest = ?")
        .bind(conversation_id)
        .bind(account_digest)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn members(pool: &SqlitePool, conversation_id: &str) -> Result<Vec<ConversationAcl>> {
    let rows = sqlx::query_as::<_, ConversationAcl>(
        "SELECT * FROM conversation_acl WHERE conversation_id = ? ORDER BY updated_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Role held by an account in a conversation, ignoring the `device_id`
/// column (any-device ACL rows and device-scoped rows both count).
pub async fn role_of(
    pool: &SqlitePool,
    conversation_id: &str,
    account_digest: &str,
) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT role FROM conversation_acl
        WHERE conversation_id = ? AND account_digest = ?
        ORDER BY updated_at DESC LIMIT 1
        "#,
    )
    .bind(conversation_id)
    .bind(account_digest)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(role,)| role))
}
