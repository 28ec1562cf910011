mod common;

use relaycore_db::repository::message;

async fn seed_accounts(pool: &sqlx::SqlitePool) {
    relaycore_db::repository::account::insert_new(pool, "SENDER", "tok-s", "uid-s")
        .await
        .unwrap();
    relaycore_db::repository::account::insert_new(pool, "RECEIVER", "tok-r", "uid-r")
        .await
        .unwrap();
}

#[tokio::test]
async fn counter_monotonicity_within_a_single_transaction() {
    let pool = common::memory_pool().await;
    seed_accounts(&pool).await;

    let mut tx = pool.begin().await.unwrap();
    let max = message::max_counter_tx(&mut tx, "conv-1", "SENDER", "dev-1").await.unwrap();
    assert_eq!(max, 0);
    let row = message::insert_tx(
        &mut tx, "msg-1", "conv-1", "SENDER", "dev-1", "RECEIVER", None,
        "{}", "cipher-1", max + 1,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(row.counter, 1);

    let max = message::max_counter(&pool, "conv-1", "SENDER", "dev-1").await.unwrap();
    assert_eq!(max, 1);

    let mut tx = pool.begin().await.unwrap();
    let max = message::max_counter_tx(&mut tx, "conv-1", "SENDER", "dev-1").await.unwrap();
    let row = message::insert_tx(
        &mut tx, "msg-2", "conv-1", "SENDER", "dev-1", "RECEIVER", None,
        "{}", "cipher-2", max + 1,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(row.counter, 2);
}

#[tokio::test]
async fn duplicate_message_id_is_a_unique_violation() {
    let pool = common::memory_pool().await;
    seed_accounts(&pool).await;

    let mut tx = pool.begin().await.unwrap();
    message::insert_tx(
        &mut tx, "dup-id", "conv-2", "SENDER", "dev-1", "RECEIVER", None,
        "{}", "cipher", 1,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let result = message::insert_tx(
        &mut tx, "dup-id", "conv-2", "SENDER", "dev-1", "RECEIVER", None,
        "{}", "cipher-2", 2,
    )
    .await;
    assert!(result.is_err());
    assert!(relaycore_common::error::is_unique_violation(&result.unwrap_err()));
}

#[tokio::test]
async fn list_filters_hidden_message_types_and_respects_deletion_cursor() {
    let pool = common::memory_pool().await;
    seed_accounts(&pool).await;

    let headers = [
        r#"{"meta":{"msgType":"text"}}"#,
        r#"{"meta":{"msgType":"typing-indicator"}}"#,
        r#"{"meta":{"msgType":"media"}}"#,
        r#"{"meta":{"msgType":"receipt"}}"#,
    ];
    for (i, header) in headers.iter().enumerate() {
        let mut tx = pool.begin().await.unwrap();
        message::insert_tx(
            &mut tx, &format!("m-{i}"), "conv-3", "SENDER", "dev-1", "RECEIVER", None,
            header, "cipher", (i + 1) as i64,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let query = relaycore_common::models::message::ListMessagesQuery {
        conversation_id: "conv-3".to_string(),
        limit: None,
        cursor_counter: None,
        cursor_id: None,
        requester_digest: None,
        include_keys: false,
    };
    let (rows, _, _) = message::list(&pool, &query, 10, 5, 0).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.id == "m-0" || r.id == "m-2"));

    // A deletion cursor at counter 1 hides the text message too.
    let (rows, _, _) = message::list(&pool, &query, 10, 5, 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "m-2");
}
