mod common;

use relaycore_db::repository::deletion;

#[tokio::test]
async fn cursor_advance_is_monotonic() {
    let pool = common::memory_pool().await;

    assert_eq!(deletion::cursor_for(&pool, "conv-1", "OWNER").await.unwrap(), 0);

    deletion::advance_cursor(&pool, "conv-1", "OWNER", 10).await.unwrap();
    assert_eq!(deletion::cursor_for(&pool, "conv-1", "OWNER").await.unwrap(), 10);

    // A stale, lower advance is silently ignored.
    deletion::advance_cursor(&pool, "conv-1", "OWNER", 3).await.unwrap();
    assert_eq!(deletion::cursor_for(&pool, "conv-1", "OWNER").await.unwrap(), 10);

    deletion::advance_cursor(&pool, "conv-1", "OWNER", 25).await.unwrap();
    assert_eq!(deletion::cursor_for(&pool, "conv-1", "OWNER").await.unwrap(), 25);
}

#[tokio::test]
async fn tombstone_log_reads_are_scoped_by_conversation_and_since() {
    let pool = common::memory_pool().await;

    deletion::append_log(&pool, "OWNER", "conv-2", "checkpoint-1").await.unwrap();
    deletion::append_log(&pool, "OTHER", "conv-2", "checkpoint-2").await.unwrap();
    deletion::append_log(&pool, "OWNER", "conv-3", "checkpoint-3").await.unwrap();

    // The conversation-scoped read returns every account's tombstones for that conversation.
    let rows = deletion::read_log_for_conversation(&pool, "conv-2", 0).await.unwrap();
    assert_eq!(rows.len(), 2);

    // The owner-scoped read only returns that owner's tombstones.
    let rows = deletion::read_log(&pool, "OWNER", "conv-2", 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].owner_digest, "OWNER");
    assert_eq!(rows[0].encrypted_checkpoint, "checkpoint-1");

    // A since-id cursor excludes entries at or before it.
    let first_id = rows[0].id;
    let rows = deletion::read_log(&pool, "OWNER", "conv-2", first_id).await.unwrap();
    assert!(rows.is_empty());
}
