use anyhow::Result;
use relaycore_common::models::call::{CallEvent, CallSession};
use sqlx::SqlitePool;

pub async fn start(
    pool: &SqlitePool,
    call_id: &str,
    conversation_id: &str,
    caller_account_digest: &str,
    caller_device_id: &str,
) -> Result<CallSession, sqlx::Error> {
    sqlx::query_as::<_, CallSession>(
        r#"
        INSERT INTO call_sessions (call_id, conversation_id, caller_account_digest, caller_device_id, state)
        VALUES (?, ?, ?, ?, 'ringing')
        ON CONFLICT (call_id) DO UPDATE SET state = call_sessions.state
        RETURNING *
        "#,
    )
    .bind(call_id)
    .bind(conversation_id)
    .bind(caller_account_digest)
    .bind(caller_device_id)
    .fetch_one(pool)
    .await
}

pub async fn record_event(
    pool: &SqlitePool,
    call_id: &str,
    account_digest: &str,
    device_id: &str,
    event: &str,
    payload_b64: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO call_events (call_id, account_digest, device_id, event, payload_b64) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(call_id)
    .bind(account_digest)
    .bind(device_id)
    .bind(event)
    .bind(payload_b64)
    .execute(pool)
    .await?;

    if event == "active" {
        sqlx::query("UPDATE call_sessions SET state = 'active' WHERE call_id = ?")
            .bind(call_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn list_events(pool: &SqlitePool, call_id: &str) -> Result<Vec<CallEvent>> {
    let rows = sqlx::query_as::<_, CallEvent>(
        "SELECT * FROM call_events WHERE call_id = ? ORDER BY id ASC",
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn end(pool: &SqlitePool, call_id: &str, end_reason: Option<&str>) -> Result<()> {
    sqlx::query(
        "UPDATE call_sessions SET state = 'ended', ended_at = strftime('%s','now'), end_reason = ? WHERE call_id = ?",
    )
    .bind(end_reason)
    .bind(call_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Best-effort cleanup of stale ringing/active sessions, throttled by the
/// caller to at most once per process-wide interval.
pub async fn cleanup_stale(pool: &SqlitePool, older_than_secs: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE call_sessions
        SET state = 'ended', ended_at = strftime('%s','now'), end_reason = 'stale'
        WHERE state IN ('ringing', 'active') AND started_at <= strftime('%s','now') - ?
        "#,
    )
    .bind(older_than_secs)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
