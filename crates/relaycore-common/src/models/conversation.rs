//! Conversation and its ACL — the membership model shared by 1:1 chats,
//! groups, and call sessions. An empty `device_id` on an ACL row means "any
//! device for that account" (stored as `""` rather than `NULL` so the
//! conflict target on `(conversation_id, account_digest, device_id)`
//! actually collapses repeat upserts instead of inserting duplicates).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ConversationAcl {
    pub conversation_id: String,
    pub account_digest: String,
    pub device_id: Option<String>,
    pub role: String,
    pub updated_at: i64,
}

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MEMBER: &str = "member";

/// `POST /d1/groups/create`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGroupResponse {
    pub conversation_id: String,
}

/// `POST /d1/groups/members/add` and `/remove`
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberRequest {
    pub conversation_id: String,
    pub member_account_digest: String,
    pub member_device_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub conversation_id: String,
    pub members: Vec<ConversationAcl>,
}

/// `POST /d1/friends/contact-delete` — the inverse of the ACL-upsert step
/// message send and group-join perform; removes one account's membership
/// row from a 1:1 conversation. Idempotent.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactDeleteRequest {
    pub conversation_id: String,
    pub contact_account_digest: String,
}

/// `POST /d1/conversations/authorize`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeConversationRequest {
    pub conversation_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeConversationResponse {
    pub authorized: bool,
    pub role: Option<String>,
}
