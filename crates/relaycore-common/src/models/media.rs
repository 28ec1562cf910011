//! Media object usage accounting. The objects themselves live in storage
//! that is out of scope here; the server only tallies the opaque keys a
//! client has reported, for quota purposes.

use serde::{Deserialize, Serialize};

/// `POST /d1/media/usage`
#[derive(Debug, Clone, Deserialize)]
pub struct RecordMediaUsageRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub object_key: String,
    pub bytes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaUsageResponse {
    pub total_bytes: i64,
}
