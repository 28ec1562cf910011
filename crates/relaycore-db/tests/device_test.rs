mod common;

use relaycore_db::repository::{account, device};

#[tokio::test]
async fn upsert_is_idempotent_and_preserves_label_on_null_update() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER", "tok", "uid").await.unwrap();

    let row = device::upsert(&pool, "OWNER", "dev-1", Some("phone")).await.unwrap();
    assert_eq!(row.label.as_deref(), Some("phone"));

    let row = device::upsert(&pool, "OWNER", "dev-1", None).await.unwrap();
    assert_eq!(row.label.as_deref(), Some("phone"));

    let row = device::upsert(&pool, "OWNER", "dev-1", Some("laptop")).await.unwrap();
    assert_eq!(row.label.as_deref(), Some("laptop"));
}

#[tokio::test]
async fn is_active_reflects_status_column() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER2", "tok", "uid").await.unwrap();
    device::upsert(&pool, "OWNER2", "dev-1", None).await.unwrap();

    // A freshly upserted device defaults to active.
    assert!(device::is_active(&pool, "OWNER2", "dev-1").await.unwrap());
    assert!(!device::is_active(&pool, "OWNER2", "dev-missing").await.unwrap());
}

#[tokio::test]
async fn most_recent_returns_a_registered_device() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER3", "tok", "uid").await.unwrap();
    device::upsert(&pool, "OWNER3", "dev-1", None).await.unwrap();

    let row = device::most_recent(&pool, "OWNER3").await.unwrap().unwrap();
    assert_eq!(row.device_id, "dev-1");
    assert!(device::most_recent(&pool, "OWNER-NONE").await.unwrap().is_none());
}
