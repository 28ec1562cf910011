use anyhow::Result;
use sqlx::SqlitePool;

pub async fn record(pool: &SqlitePool, account_digest: &str, object_key: &str, bytes: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_usage (account_digest, object_key, bytes)
        VALUES (?, ?, ?)
        ON CONFLICT (account_digest, object_key) DO UPDATE SET bytes = excluded.bytes
        "#,
    )
    .bind(account_digest)
    .bind(object_key)
    .bind(bytes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn total_bytes(pool: &SqlitePool, account_digest: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT SUM(bytes) FROM media_usage WHERE account_digest = ?")
        .bind(account_digest)
        .fetch_one(pool)
        .await?;
    Ok(row.0.unwrap_or(0))
}
