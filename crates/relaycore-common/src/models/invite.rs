//! Invite dropbox — a one-shot rendezvous slot a sender drops an invite
//! envelope into, and a single recipient drains. State machine:
//! `created -> delivered -> consumed`, or `expired` once past `expires_at`.

use serde::{Deserialize, Serialize};

use crate::models::prekey::PrekeyBundle;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct InviteDropbox {
    pub invite_id: String,
    pub owner_account_digest: String,
    pub owner_device_id: String,
    pub owner_public_key_b64: String,
    pub expires_at: i64,
    pub status: String,
    pub delivered_by_account_digest: Option<String>,
    pub delivered_by_device_id: Option<String>,
    pub delivered_at: Option<i64>,
    pub consumed_at: Option<i64>,
    pub ciphertext_json: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub const STATUS_CREATED: &str = "CREATED";
pub const STATUS_DELIVERED: &str = "DELIVERED";
pub const STATUS_CONSUMED: &str = "CONSUMED";
pub const STATUS_EXPIRED: &str = "EXPIRED";

/// Top-level keys accepted on each invite-dropbox body. Anything else is a
/// hard 400 `InviteSchemaMismatch` — the server's schema-stability guarantee.
pub const CREATE_KEYS: &[&str] = &[
    "invite_id",
    "owner_account_digest",
    "owner_account_token",
    "owner_device_id",
    "owner_public_key_b64",
    "ttl_secs",
];
pub const DELIVER_KEYS: &[&str] = &[
    "invite_id",
    "delivered_by_account_digest",
    "delivered_by_account_token",
    "delivered_by_device_id",
    "envelope_b64",
    "expires_at",
];
pub const CONSUME_KEYS: &[&str] = &[
    "invite_id",
    "owner_account_digest",
    "owner_account_token",
];
pub const STATUS_KEYS: &[&str] = &["invite_id"];

/// `POST /d1/invites/create`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInviteRequest {
    pub invite_id: String,
    pub owner_account_digest: Option<String>,
    pub owner_account_token: Option<String>,
    pub owner_device_id: String,
    pub owner_public_key_b64: String,
    pub ttl_secs: Option<i64>,
}

/// The OPK is allocated from the owner's own bundle and bound into the
/// response so the guest can complete X3DH without a separate bundle fetch.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInviteResponse {
    pub invite_id: String,
    pub expires_at: i64,
    pub prekey_bundle: PrekeyBundle,
}

/// `POST /d1/invites/deliver`
#[derive(Debug, Clone, Deserialize)]
pub struct DeliverInviteRequest {
    pub invite_id: String,
    pub delivered_by_account_digest: Option<String>,
    pub delivered_by_account_token: Option<String>,
    pub delivered_by_device_id: String,
    pub envelope_b64: String,
    /// Must equal the invite's stored `expires_at`, or the deliver is a 400.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverInviteResponse {
    pub ok: bool,
}

/// `POST /d1/invites/consume` — owner-only.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumeInviteRequest {
    pub invite_id: String,
    pub owner_account_digest: Option<String>,
    pub owner_account_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumeInviteResponse {
    pub envelope_b64: String,
}

/// `GET /d1/invites/status`
#[derive(Debug, Clone, Deserialize)]
pub struct InviteStatusQuery {
    pub invite_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteStatusResponse {
    pub status: String,
    pub expires_at: i64,
}
