//! Device — a client device registered against an account.
//!
//! Referenced as a foreign key by prekey and vault rows. Upserted by client
//! registration; never deleted except by account purge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Device {
    pub account_digest: String,
    pub device_id: String,
    pub label: Option<String>,
    pub status: String,
    /// Opaque client key-material blob — server never parses it.
    pub device_key_json: Option<String>,
    pub last_seen_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertDeviceRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub device_id: String,
    pub label: Option<String>,
}
