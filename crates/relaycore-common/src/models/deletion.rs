//! Deletion cursors and the encrypted per-conversation tombstone log.
//! A message delete never removes rows a peer might still need to sync
//! past; it advances a per-(conversation, account) floor instead, and the
//! tombstone log gives other devices of the same account an opaque
//! checkpoint to replay "this conversation was cleared locally" against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeletionLogEntry {
    pub id: i64,
    pub owner_digest: String,
    pub conversation_id: String,
    pub encrypted_checkpoint: String,
    pub created_at: i64,
}

/// `POST /d1/deletion/cursor`
#[derive(Debug, Clone, Deserialize)]
pub struct AdvanceCursorRequest {
    pub conversation_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub min_counter: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceCursorResponse {
    pub ok: bool,
    pub min_counter: i64,
}

/// `POST /d1/deletion/log`
#[derive(Debug, Clone, Deserialize)]
pub struct AppendDeletionLogRequest {
    pub conversation_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub encrypted_checkpoint: String,
}

/// `GET /d1/deletion/log`
#[derive(Debug, Clone, Deserialize)]
pub struct DeletionLogQuery {
    pub conversation_id: String,
    pub account_digest: String,
    #[serde(default)]
    pub since: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionLogResponse {
    pub entries: Vec<DeletionLogEntry>,
}
