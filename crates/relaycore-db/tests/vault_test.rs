mod common;

use relaycore_db::repository::{account, vault};

#[tokio::test]
async fn upsert_is_idempotent_and_never_overwrites() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER", "tok", "uid").await.unwrap();

    vault::upsert(&pool, "OWNER", "conv-1", "msg-1", "dev-1", "send", "wrapped-a", "ctx-a", None)
        .await
        .unwrap();
    // Same primary key, different payload: ON CONFLICT DO NOTHING keeps the first write.
    vault::upsert(&pool, "OWNER", "conv-1", "msg-1", "dev-1", "send", "wrapped-b", "ctx-b", None)
        .await
        .unwrap();

    let row = vault::find_by_message_id(&pool, "OWNER", "conv-1", "msg-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.wrapped_key_b64, "wrapped-a");
    assert_eq!(row.wrap_context, "ctx-a");
}

#[tokio::test]
async fn latest_state_separates_send_and_recv_directions() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER2", "tok", "uid").await.unwrap();

    vault::upsert(&pool, "OWNER2", "conv-2", "m-send-1", "dev-1", "send", "w1", "c1", None)
        .await
        .unwrap();
    vault::upsert(&pool, "OWNER2", "conv-2", "m-recv-1", "dev-1", "recv", "w2", "c2", None)
        .await
        .unwrap();

    let (outgoing, incoming) = vault::latest_state(&pool, "OWNER2", "conv-2", Some("dev-1"))
        .await
        .unwrap();
    assert_eq!(outgoing.unwrap().message_id, "m-send-1");
    assert_eq!(incoming.unwrap().message_id, "m-recv-1");
}

#[tokio::test]
async fn count_and_delete_by_message_id() {
    let pool = common::memory_pool().await;
    account::insert_new(&pool, "OWNER3", "tok", "uid").await.unwrap();

    vault::upsert(&pool, "OWNER3", "conv-3", "m1", "dev-1", "send", "w", "c", None)
        .await
        .unwrap();
    assert_eq!(vault::count(&pool, "OWNER3", "conv-3").await.unwrap(), 1);

    vault::delete_by_message_id(&pool, "OWNER3", "conv-3", "m1").await.unwrap();
    assert_eq!(vault::count(&pool, "OWNER3", "conv-3").await.unwrap(), 0);
}
