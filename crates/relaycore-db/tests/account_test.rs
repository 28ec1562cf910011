mod common;

use relaycore_db::repository::account;

#[tokio::test]
async fn insert_new_then_find_roundtrips() {
    let pool = common::memory_pool().await;

    let row = account::insert_new(&pool, "DIGEST1", "token-abc", "UID1")
        .await
        .unwrap();
    assert_eq!(row.last_ctr, 0);

    let found = account::find_by_digest(&pool, "DIGEST1").await.unwrap().unwrap();
    assert_eq!(found.account_token, "token-abc");

    let by_uid = account::find_by_uid_digest(&pool, "UID1").await.unwrap().unwrap();
    assert_eq!(by_uid.account_digest, "DIGEST1");
}

#[tokio::test]
async fn advance_ctr_rejects_non_increasing_values() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "DIGEST2", "token-xyz", "UID2").await.unwrap();

    assert!(account::advance_ctr_if_greater(&pool, "DIGEST2", 5).await.unwrap());
    let row = account::find_by_digest(&pool, "DIGEST2").await.unwrap().unwrap();
    assert_eq!(row.last_ctr, 5);

    // Replay of the same or a lower counter is a silent no-op, not an error.
    assert!(!account::advance_ctr_if_greater(&pool, "DIGEST2", 5).await.unwrap());
    assert!(!account::advance_ctr_if_greater(&pool, "DIGEST2", 3).await.unwrap());

    let row = account::find_by_digest(&pool, "DIGEST2").await.unwrap().unwrap();
    assert_eq!(row.last_ctr, 5);

    assert!(account::advance_ctr_if_greater(&pool, "DIGEST2", 9).await.unwrap());
    let row = account::find_by_digest(&pool, "DIGEST2").await.unwrap().unwrap();
    assert_eq!(row.last_ctr, 9);
}

#[tokio::test]
async fn insert_new_unique_violation_on_duplicate_digest() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "DIGEST3", "token-1", "UID3").await.unwrap();
    let err = account::insert_new(&pool, "DIGEST3", "token-2", "UID4").await;
    assert!(err.is_err());
}
