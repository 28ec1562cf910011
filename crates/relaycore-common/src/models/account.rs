//! Account — the resolver's unit of identity.
//!
//! `account_digest = SHA-256(account_token)` unless the account was created
//! from a UID alone, in which case `account_digest = uid_digest`. Never
//! mutated except `last_ctr`, `wrapped_mk_json`, `opaque_envelope`, `updated_at`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    pub account_digest: String,
    pub account_token: String,
    pub uid_digest: String,
    pub last_ctr: i64,
    pub wrapped_mk_json: Option<String>,
    /// Opaque OPAQUE-protocol registration envelope — server never parses it.
    pub opaque_envelope: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input to the account resolver: any non-empty subset of the three
/// identifying fields, plus whether account creation is permitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveAccountInput {
    pub uid_hex: Option<String>,
    pub account_token: Option<String>,
    pub account_digest: Option<String>,
    #[serde(default)]
    pub allow_create: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveAccountResult {
    pub account: Account,
    pub newly_created: bool,
}

/// `POST /d1/tags/exchange`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRequest {
    pub uid_hex: Option<String>,
    pub account_token: Option<String>,
    pub account_digest: Option<String>,
    pub ctr: i64,
    #[serde(default)]
    pub allow_create: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResponse {
    pub has_mk: bool,
    pub account_token: String,
    pub account_digest: String,
    pub uid_digest: String,
    pub newly_created: bool,
    pub last_ctr: i64,
}
