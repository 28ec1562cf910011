mod common;

use relaycore_db::repository::{account, backup};

#[tokio::test]
async fn version_is_monotonic_and_retention_trims_oldest() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER", "tok", "uid").await.unwrap();

    for i in 1..=7 {
        let version = backup::next_version(&pool, "OWNER").await.unwrap();
        assert_eq!(version, i);
        backup::insert(&pool, "OWNER", version, &format!("blob-{i}"), i, None, None)
            .await
            .unwrap();
        backup::trim(&pool, "OWNER", 5).await.unwrap();
    }

    let rows = backup::list(&pool, "OWNER", 100).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].version, 7);
    assert_eq!(rows[4].version, 3);
}

#[tokio::test]
async fn max_with_dr_state_tracks_regression_guard_input() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER2", "tok", "uid").await.unwrap();

    assert_eq!(backup::max_with_dr_state(&pool, "OWNER2").await.unwrap(), 0);

    backup::insert(&pool, "OWNER2", 1, "blob", 10, None, None).await.unwrap();
    assert_eq!(backup::max_with_dr_state(&pool, "OWNER2").await.unwrap(), 10);

    // A later, lower-numbered write doesn't lower the ceiling the guard compares against.
    backup::insert(&pool, "OWNER2", 2, "blob2", 4, None, None).await.unwrap();
    assert_eq!(backup::max_with_dr_state(&pool, "OWNER2").await.unwrap(), 10);
}

#[tokio::test]
async fn find_version_returns_the_exact_retained_row() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER3", "tok", "uid").await.unwrap();
    backup::insert(&pool, "OWNER3", 1, "blob-1", 1, Some("phone"), Some("dev-1"))
        .await
        .unwrap();

    let row = backup::find_version(&pool, "OWNER3", 1).await.unwrap().unwrap();
    assert_eq!(row.blob_b64, "blob-1");
    assert!(backup::find_version(&pool, "OWNER3", 2).await.unwrap().is_none());
}
