//! Secure messages — the per-(conversation, sender-device) monotonic
//! counter append path. The server stores ciphertext and header metadata
//! only; it never parses `ciphertext_b64`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SecureMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_account_digest: String,
    pub sender_device_id: String,
    pub receiver_account_digest: String,
    pub receiver_device_id: Option<String>,
    pub header_json: String,
    pub ciphertext_b64: String,
    pub counter: i64,
    pub created_at: i64,
}

/// Visible message types for the list-read filter (see `messages::list`).
pub const VISIBLE_MSG_TYPES: [&str; 4] = ["text", "media", "call-log", "system"];

/// `POST /d1/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub id: String,
    pub conversation_id: String,
    pub sender_account_digest: Option<String>,
    pub sender_device_id: String,
    pub receiver_account_digest: String,
    pub receiver_device_id: Option<String>,
    pub header: serde_json::Value,
    pub ciphertext_b64: String,
    pub counter: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub id: String,
    pub created_at: i64,
}

/// `GET /d1/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct ListMessagesQuery {
    pub conversation_id: String,
    pub limit: Option<i64>,
    pub cursor_counter: Option<i64>,
    pub cursor_id: Option<String>,
    pub requester_digest: Option<String>,
    #[serde(default)]
    pub include_keys: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<SecureMessage>,
    pub next_cursor_counter: Option<i64>,
    pub next_cursor_id: Option<String>,
}

/// `GET /d1/messages/by-counter`
#[derive(Debug, Clone, Deserialize)]
pub struct ByCounterQuery {
    pub conversation_id: String,
    pub sender_account_digest: String,
    pub sender_device_id: String,
    pub counter: i64,
}

/// `/d1/messages/send-state`, `/d1/messages/secure/max-counter`
#[derive(Debug, Clone, Deserialize)]
pub struct SendStateRequest {
    pub conversation_id: String,
    pub sender_account_digest: Option<String>,
    pub sender_device_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendStateResponse {
    pub max_counter: i64,
}

/// `/d1/messages/outgoing-status`
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingStatusRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingStatusResponse {
    pub committed: bool,
    pub created_at: Option<i64>,
}

/// `/d1/messages/delete`
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteMessageRequest {
    pub id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
}

/// `/d1/messages/secure/delete-conversation`
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteConversationRequest {
    pub conversation_id: String,
}
