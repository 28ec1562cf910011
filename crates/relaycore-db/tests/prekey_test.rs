mod common;

use relaycore_db::repository::{account, prekey};

#[tokio::test]
async fn one_time_prekey_consumed_at_most_once_under_concurrency() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "DEV-OWNER", "tok", "uid").await.unwrap();
    prekey::upsert_signed_prekey(&pool, "DEV-OWNER", "dev-1", 1, "spk-pub", "spk-sig", "ik-pub")
        .await
        .unwrap();
    prekey::insert_one_time_prekeys(
        &pool,
        "DEV-OWNER",
        "dev-1",
        &[relaycore_common::models::prekey::OpkUpload { opk_id: 1, opk_pub: "opk-pub".into() }],
    )
    .await
    .unwrap();

    let attempts = 8;
    let mut handles = Vec::new();
    for _ in 0..attempts {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            prekey::consume_one_time_prekey(&pool, "DEV-OWNER", "dev-1").await.unwrap()
        }));
    }

    let mut consumed = 0;
    for h in handles {
        if h.await.unwrap().is_some() {
            consumed += 1;
        }
    }
    assert_eq!(consumed, 1, "exactly one concurrent fetcher should win the only OPK");

    // A subsequent fetch finds nothing left.
    assert!(prekey::consume_one_time_prekey(&pool, "DEV-OWNER", "dev-1").await.unwrap().is_none());
}

#[tokio::test]
async fn next_opk_id_and_signed_prekey_upsert() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "DEV-OWNER2", "tok", "uid").await.unwrap();

    assert_eq!(prekey::next_opk_id(&pool, "DEV-OWNER2", "dev-1").await.unwrap(), 1);
    prekey::insert_one_time_prekeys(
        &pool,
        "DEV-OWNER2",
        "dev-1",
        &[
            relaycore_common::models::prekey::OpkUpload { opk_id: 1, opk_pub: "a".into() },
            relaycore_common::models::prekey::OpkUpload { opk_id: 2, opk_pub: "b".into() },
        ],
    )
    .await
    .unwrap();
    assert_eq!(prekey::next_opk_id(&pool, "DEV-OWNER2", "dev-1").await.unwrap(), 3);

    prekey::upsert_signed_prekey(&pool, "DEV-OWNER2", "dev-1", 5, "pub-a", "sig-a", "ik-a")
        .await
        .unwrap();
    prekey::upsert_signed_prekey(&pool, "DEV-OWNER2", "dev-1", 5, "pub-b", "sig-b", "ik-a")
        .await
        .unwrap();
    let row = prekey::most_recent_signed_prekey(&pool, "DEV-OWNER2", "dev-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.spk_pub, "pub-b");
}
