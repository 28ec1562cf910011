//! Signed prekeys and one-time prekeys — the X3DH-style bundle halves the
//! server holds. Identity keys are Ed25519; signed prekeys are verified
//! against them at publish time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SignedPrekey {
    pub account_digest: String,
    pub device_id: String,
    pub spk_id: i64,
    pub spk_pub: String,
    pub spk_sig: String,
    pub ik_pub: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OneTimePrekey {
    pub account_digest: String,
    pub device_id: String,
    pub opk_id: i64,
    pub opk_pub: String,
    pub issued_at: i64,
    pub consumed_at: Option<i64>,
}

/// A single one-time prekey upload entry.
#[derive(Debug, Clone, Deserialize)]
pub struct OpkUpload {
    pub opk_id: i64,
    pub opk_pub: String,
}

/// `POST /d1/prekeys/publish`
#[derive(Debug, Clone, Deserialize)]
pub struct PublishPrekeysRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub device_id: String,
    pub ik_pub: String,
    pub spk_id: i64,
    pub spk_pub: String,
    pub spk_sig: String,
    #[serde(default)]
    pub one_time_prekeys: Vec<OpkUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishPrekeysResponse {
    pub next_opk_id: i64,
}

/// The public half of an X3DH bundle — a signed prekey plus (if available)
/// one freshly consumed one-time prekey.
#[derive(Debug, Clone, Serialize)]
pub struct PrekeyBundle {
    pub account_digest: String,
    pub device_id: String,
    pub ik_pub: String,
    pub spk_id: i64,
    pub spk_pub: String,
    pub spk_sig: String,
    pub opk: Option<OpkPublic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpkPublic {
    pub opk_id: i64,
    pub opk_pub: String,
}
