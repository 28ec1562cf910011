//! Contact-secret backups — an opaque blob per account that a client can
//! push and later restore, guarded against silent regression by a
//! monotonic `version`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ContactSecretsBackup {
    pub account_digest: String,
    pub version: i64,
    pub blob_b64: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// `POST /d1/contact-secrets/backup`
#[derive(Debug, Clone, Deserialize)]
pub struct StoreBackupRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    /// Omit to let the server assign `MAX(version) + 1`.
    #[serde(default)]
    pub version: Option<i64>,
    pub blob_b64: String,
    /// Regression guard: the highest `withDrState` ever accepted for this
    /// account must never decrease across retained rows.
    #[serde(default)]
    pub with_dr_state: i64,
    pub device_label: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreBackupResponse {
    pub ok: bool,
    pub version: i64,
}

/// `GET /d1/contact-secrets/backup`
#[derive(Debug, Clone, Deserialize)]
pub struct FetchBackupQuery {
    pub account_digest: String,
    #[serde(default = "default_fetch_limit")]
    pub limit: i64,
}

fn default_fetch_limit() -> i64 {
    1
}
