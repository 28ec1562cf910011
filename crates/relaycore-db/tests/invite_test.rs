mod common;

use relaycore_common::models::invite::{STATUS_CONSUMED, STATUS_CREATED, STATUS_DELIVERED, STATUS_EXPIRED};
use relaycore_db::repository::invite;

#[tokio::test]
async fn invite_lifecycle_created_delivered_consumed() {
    let pool = common::memory_pool().await;

    let now = chrono::Utc::now().timestamp();
    let created = invite::create(&pool, "inv-1", "OWNER", "owner-dev", "owner-pub", now + 300)
        .await
        .unwrap();
    assert_eq!(created.status, STATUS_CREATED);

    let delivered = invite::deliver(&pool, "inv-1", "SENDER", "sender-dev", "{}").await.unwrap();
    assert!(delivered);
    let row = invite::find(&pool, "inv-1").await.unwrap().unwrap();
    assert_eq!(row.status, STATUS_DELIVERED);

    // A second delivery attempt loses the race: already past CREATED.
    let delivered_again = invite::deliver(&pool, "inv-1", "SENDER", "sender-dev", "{}").await.unwrap();
    assert!(!delivered_again);

    invite::consume(&pool, "inv-1").await.unwrap();
    let row = invite::find(&pool, "inv-1").await.unwrap().unwrap();
    assert_eq!(row.status, STATUS_CONSUMED);

    // Consuming an already-consumed row is a harmless no-op.
    invite::consume(&pool, "inv-1").await.unwrap();
    let row = invite::find(&pool, "inv-1").await.unwrap().unwrap();
    assert_eq!(row.status, STATUS_CONSUMED);
}

#[tokio::test]
async fn expired_invite_is_promoted_and_rejects_delivery() {
    let pool = common::memory_pool().await;
    let past = chrono::Utc::now().timestamp() - 10;
    invite::create(&pool, "inv-2", "OWNER", "owner-dev", "owner-pub", past)
        .await
        .unwrap();

    let delivered = invite::deliver(&pool, "inv-2", "SENDER", "sender-dev", "{}").await.unwrap();
    assert!(!delivered, "expired dropbox must refuse delivery even while status is still CREATED");

    invite::promote_expired(&pool, "inv-2").await.unwrap();
    let row = invite::find(&pool, "inv-2").await.unwrap().unwrap();
    assert_eq!(row.status, STATUS_EXPIRED);
}

#[tokio::test]
async fn concurrent_delivery_only_one_winner() {
    let pool = common::memory_pool().await;
    let now = chrono::Utc::now().timestamp();
    invite::create(&pool, "inv-3", "OWNER", "owner-dev", "owner-pub", now + 300)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            invite::deliver(&pool, "inv-3", &format!("SENDER-{i}"), "dev", "{}").await.unwrap()
        }));
    }
    let mut wins = 0;
    for h in handles {
        if h.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}
