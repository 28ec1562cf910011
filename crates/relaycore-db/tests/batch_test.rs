mod common;

use relaycore_db::repository::{account, batch, message, vault};

async fn seed(pool: &sqlx::SqlitePool) {
    account::insert_new(pool, "SENDER", "tok-s", "uid-s").await.unwrap();
    account::insert_new(pool, "RECEIVER", "tok-r", "uid-r").await.unwrap();
}

fn input<'a>(message_id: &'a str, counter: i64, backup: Option<batch::AtomicSendBackup<'a>>) -> batch::AtomicSendInput<'a> {
    batch::AtomicSendInput {
        message_id,
        conversation_id: "conv-1",
        sender_account_digest: "SENDER",
        sender_device_id: "dev-1",
        receiver_account_digest: "RECEIVER",
        receiver_device_id: None,
        header_json: "{}",
        ciphertext_b64: "cipher",
        counter,
        vault_device_id: "dev-1",
        vault_direction: "send",
        wrapped_key_b64: "wrapped",
        wrap_context: "ctx",
        dr_state_snapshot: None,
        backup,
        backup_retain: 5,
    }
}

#[tokio::test]
async fn atomic_send_commits_message_vault_and_backup_together() {
    let pool = common::memory_pool().await;
    seed(&pool).await;

    let outcome = batch::atomic_send(
        &pool,
        input(
            "msg-1",
            1,
            Some(batch::AtomicSendBackup {
                payload_json: "backup-blob",
                with_dr_state: 1,
                device_label: None,
                device_id: None,
            }),
        ),
    )
    .await
    .unwrap();

    match outcome {
        batch::AtomicSendOutcome::Committed(row) => assert_eq!(row.id, "msg-1"),
        _ => panic!("expected a commit"),
    }

    assert!(message::find_by_id(&pool, "msg-1").await.unwrap().is_some());
    assert!(vault::find_by_message_id(&pool, "SENDER", "conv-1", "msg-1").await.unwrap().is_some());

    let backups = relaycore_db::repository::backup::list(&pool, "SENDER", 10).await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].blob_b64, "backup-blob");
}

#[tokio::test]
async fn atomic_send_rolls_back_entirely_on_duplicate_message_id() {
    let pool = common::memory_pool().await;
    seed(&pool).await;

    batch::atomic_send(&pool, input("msg-dup", 1, None)).await.unwrap();

    // Same id, higher counter: the id collision is the thing under test here,
    // not the counter invariant (covered separately below).
    let outcome = batch::atomic_send(&pool, input("msg-dup", 2, None)).await.unwrap();
    assert!(matches!(outcome, batch::AtomicSendOutcome::Conflict));

    // Only the first send's vault row exists; the conflicting retry left no partial state.
    assert_eq!(vault::count(&pool, "SENDER", "conv-1").await.unwrap(), 1);
}

#[tokio::test]
async fn atomic_send_rejects_counter_not_exceeding_max() {
    let pool = common::memory_pool().await;
    seed(&pool).await;

    batch::atomic_send(&pool, input("msg-a", 1, None)).await.unwrap();

    let outcome = batch::atomic_send(&pool, input("msg-b", 1, None)).await.unwrap();
    match outcome {
        batch::AtomicSendOutcome::CounterTooLow(max_counter) => assert_eq!(max_counter, 1),
        _ => panic!("expected CounterTooLow"),
    }

    // The second send's message and vault rows never landed.
    assert!(message::find_by_id(&pool, "msg-b").await.unwrap().is_none());
    assert_eq!(vault::count(&pool, "SENDER", "conv-1").await.unwrap(), 1);
}
