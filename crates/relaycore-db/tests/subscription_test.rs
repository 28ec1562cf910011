mod common;

use relaycore_db::repository::{account, subscription};

#[tokio::test]
async fn redeem_upserts_subscription_and_marks_token_used() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER", "tok", "uid").await.unwrap();

    assert_eq!(subscription::current_expiry(&pool, "OWNER").await.unwrap(), 0);
    assert!(subscription::find_token(&pool, "token-1").await.unwrap().is_none());

    subscription::redeem(&pool, "OWNER", 1_700_000_000, "token-1", 1_699_000_000, 30, "nonce-1", "key-1", "sig-1")
        .await
        .unwrap();

    assert_eq!(subscription::current_expiry(&pool, "OWNER").await.unwrap(), 1_700_000_000);
    let token = subscription::find_token(&pool, "token-1").await.unwrap().unwrap();
    assert_eq!(token.status, "used");
    assert_eq!(token.used_by_digest.as_deref(), Some("OWNER"));
}

#[tokio::test]
async fn purge_account_clears_every_owned_table_best_effort() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER2", "tok", "uid").await.unwrap();
    subscription::redeem(&pool, "OWNER2", 1_700_000_000, "token-2", 1_699_000_000, 30, "nonce", "key", "sig")
        .await
        .unwrap();

    let results = subscription::purge_account(&pool, "OWNER2").await;
    assert!(results.iter().any(|(table, _)| table == "accounts"));
    assert!(account::find_by_digest(&pool, "OWNER2").await.unwrap().is_none());
    assert!(subscription::current_expiry(&pool, "OWNER2").await.unwrap() == 0);
}
