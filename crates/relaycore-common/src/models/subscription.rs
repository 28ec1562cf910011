//! Token redemption — single-use entitlement tokens redeemed against an
//! account digest. Redemption is idempotent for the same digest, rejected
//! for any other.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RedeemableToken {
    pub token_digest: String,
    pub used_at: Option<i64>,
    pub used_by_digest: Option<String>,
    pub created_at: i64,
}

/// `POST /d1/subscription/redeem`
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemTokenRequest {
    pub token_id: String,
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
    pub duration_days: i64,
    pub nonce: String,
    pub key_id: String,
    pub signature_b64: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemTokenResponse {
    pub ok: bool,
    pub expires_at: i64,
    pub dry_run: bool,
}

/// `GET /d1/subscription/status`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionStatusQuery {
    pub account_digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatusResponse {
    pub expires_at: Option<i64>,
}

/// `GET /d1/subscription/token-status`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenStatusQuery {
    pub token_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenStatusResponse {
    pub status: String,
    pub used_at: Option<i64>,
    pub used_by_digest: Option<String>,
}

/// `POST /d1/account/purge`
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeAccountRequest {
    pub account_digest: Option<String>,
    pub account_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeAccountResponse {
    pub ok: bool,
    pub tables_cleared: Vec<String>,
}
