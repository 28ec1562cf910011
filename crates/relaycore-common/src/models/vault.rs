//! Message-key vault — wrapped per-message keys, keyed by the same id as
//! the `SecureMessage` they unlock. The server stores wrapped blobs and a
//! wrap-context binding tag; it never sees a plaintext message key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct VaultEntry {
    pub message_id: String,
    pub conversation_id: String,
    pub account_digest: String,
    pub device_id: String,
    pub direction: String,
    pub wrapped_key_b64: String,
    pub wrap_context: String,
    pub dr_state_snapshot: Option<String>,
    pub created_at: i64,
}

pub const DIRECTION_SEND: &str = "send";
pub const DIRECTION_RECV: &str = "recv";

/// `POST /d1/message-key-vault/put`
#[derive(Debug, Clone, Deserialize)]
pub struct StoreVaultEntryRequest {
    pub message_id: String,
    pub conversation_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub device_id: String,
    /// The device on the other end of this wrapped key, when known — bound
    /// into `wrap_context.targetDeviceId` if present.
    pub target_device_id: Option<String>,
    pub direction: String,
    pub wrapped_key_b64: String,
    pub wrap_context: String,
    pub dr_state_snapshot: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreVaultEntryResponse {
    pub ok: bool,
}

/// `POST /d1/message-key-vault/get` — looked up by `message_id` when the
/// caller knows the server message id, or by `header_counter` when it only
/// knows the ratchet counter (the receiver's case before it has fetched
/// the message itself).
#[derive(Debug, Clone, Deserialize)]
pub struct FetchVaultEntryQuery {
    pub conversation_id: String,
    pub account_digest: String,
    pub wrap_context: String,
    pub message_id: Option<String>,
    pub header_counter: Option<i64>,
}

/// The atomic "message + wrapped key + backup" commit. Three writes, one
/// transaction: insert the `SecureMessage`, insert the `VaultEntry`, and
/// bump the sender's `Account.last_ctr` — or none of them happen.
#[derive(Debug, Clone, Deserialize)]
pub struct AtomicSendRequest {
    pub message: crate::models::message::SendMessageRequest,
    pub vault_entry: StoreVaultEntryRequest,
    /// Optional contact-secrets backup to persist in the same transaction.
    /// The server always assigns the version (`MAX(version) + 1`).
    pub backup: Option<AtomicSendBackupRequest>,
}

/// The backup leg of [`AtomicSendRequest`]. `account_digest` must match the
/// resolved sender — a caller cannot piggyback a backup write for someone
/// else's account onto their own message send.
#[derive(Debug, Clone, Deserialize)]
pub struct AtomicSendBackupRequest {
    pub account_digest: String,
    pub blob_b64: String,
    #[serde(default)]
    pub with_dr_state: i64,
    pub device_label: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AtomicSendResponse {
    pub ok: bool,
    pub id: String,
    pub created_at: i64,
}
