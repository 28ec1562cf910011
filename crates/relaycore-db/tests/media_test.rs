mod common;

use relaycore_db::repository::{account, media};

#[tokio::test]
async fn record_upserts_by_object_key_and_totals_sum_correctly() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER", "tok", "uid").await.unwrap();

    media::record(&pool, "OWNER", "obj-1", 1000).await.unwrap();
    media::record(&pool, "OWNER", "obj-2", 2000).await.unwrap();
    assert_eq!(media::total_bytes(&pool, "OWNER").await.unwrap(), 3000);

    // Re-reporting the same key replaces its byte count rather than summing.
    media::record(&pool, "OWNER", "obj-1", 1500).await.unwrap();
    assert_eq!(media::total_bytes(&pool, "OWNER").await.unwrap(), 3500);
}

#[tokio::test]
async fn total_bytes_is_zero_for_unknown_account() {
    let pool = common::memory_pool().await;
    assert_eq!(media::total_bytes(&pool, "NOBODY").await.unwrap(), 0);
}
