mod common;

use relaycore_common::models::conversation::{ROLE_MEMBER, ROLE_OWNER};
use relaycore_db::repository::conversation;

#[tokio::test]
async fn upsert_acl_then_role_of_and_remove_member() {
    let pool = common::memory_pool().await;

    conversation::upsert_acl(&pool, "conv-1", "OWNER", Some("dev-1"), ROLE_OWNER)
        .await
        .unwrap();
    conversation::upsert_acl(&pool, "conv-1", "MEMBER", Some("dev-2"), ROLE_MEMBER)
        .await
        .unwrap();

    assert_eq!(conversation::role_of(&pool, "conv-1", "OWNER").await.unwrap().as_deref(), Some(ROLE_OWNER));
    assert_eq!(conversation::role_of(&pool, "conv-1", "MEMBER").await.unwrap().as_deref(), Some(ROLE_MEMBER));
    assert!(conversation::role_of(&pool, "conv-1", "STRANGER").await.unwrap().is_none());

    let members = conversation::members(&pool, "conv-1").await.unwrap();
    assert_eq!(members.len(), 2);

    conversation::remove_member(&pool, "conv-1", "MEMBER").await.unwrap();
    assert!(conversation::role_of(&pool, "conv-1", "MEMBER").await.unwrap().is_none());
    assert_eq!(conversation::members(&pool, "conv-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_acl_role_change_is_an_update_not_a_duplicate() {
    let pool = common::memory_pool().await;
    conversation::upsert_acl(&pool, "conv-2", "ALICE", None, ROLE_MEMBER).await.unwrap();
    conversation::upsert_acl(&pool, "conv-2", "ALICE", None, ROLE_OWNER).await.unwrap();

    let members = conversation::members(&pool, "conv-2").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, ROLE_OWNER);
}
