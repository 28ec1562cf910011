//! Call sessions — signalling-only bookkeeping for a voice/video call tied
//! to a conversation. No media ever transits the server; rows here only
//! record who rang whom and how the call ended.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CallSession {
    pub call_id: String,
    pub conversation_id: String,
    pub caller_account_digest: String,
    pub caller_device_id: String,
    pub state: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub end_reason: Option<String>,
}

pub const CALL_STATE_RINGING: &str = "ringing";
pub const CALL_STATE_ACTIVE: &str = "active";
pub const CALL_STATE_ENDED: &str = "ended";

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CallEvent {
    pub id: i64,
    pub call_id: String,
    pub account_digest: String,
    pub device_id: String,
    pub event: String,
    pub payload_b64: Option<String>,
    pub created_at: i64,
}

/// `POST /d1/calls/session` — upsert-only. Omitting `end_reason` creates or
/// keeps a session ringing/active; setting it transitions the same row to
/// `ended`, so callers never need a separate end endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertCallSessionRequest {
    pub call_id: String,
    pub conversation_id: String,
    pub caller_account_digest: Option<String>,
    pub caller_account_token: Option<String>,
    pub caller_device_id: String,
    pub end_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertCallSessionResponse {
    pub call_id: String,
    pub state: String,
    pub started_at: i64,
}

/// `POST /d1/calls/events`
#[derive(Debug, Clone, Deserialize)]
pub struct CallEventRequest {
    pub call_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub device_id: String,
    pub event: String,
    pub payload_b64: Option<String>,
}

/// `GET /d1/calls/events`
#[derive(Debug, Clone, Deserialize)]
pub struct ListCallEventsQuery {
    pub call_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListCallEventsResponse {
    pub events: Vec<CallEvent>,
}
