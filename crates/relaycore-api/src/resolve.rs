//! The account resolver shared by every handler that accepts
//! `{uidHex, accountToken, accountDigest}` — lookup-or-create with
//! collision recovery on a concurrent insert.

use relaycore_common::config::AppConfig;
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::{ResolveAccountInput, ResolveAccountResult};
use relaycore_common::{crypto, error, normalize};
use relaycore_db::repository::account;
use sqlx::SqlitePool;

pub async fn resolve_account(
    pool: &SqlitePool,
    config: &AppConfig,
    input: &ResolveAccountInput,
) -> RelayResult<ResolveAccountResult> {
    let uid = input
        .uid_hex
        .as_deref()
        .map(normalize::normalize_uid)
        .transpose()?;
    let token = input.account_token.as_deref();
    let given_digest = input
        .account_digest
        .as_deref()
        .map(normalize::normalize_account_digest)
        .transpose()?;

    let token_digest = token.map(|t| crypto::sha256_hex_upper(t.as_bytes()));
    let digest = given_digest.clone().or_else(|| token_digest.clone());

    let uid_digest = uid
        .as_deref()
        .map(|u| crypto::uid_digest(&account_key(config)?, u))
        .transpose()?;

    let existing = if let Some(d) = &digest {
        account::find_by_digest(pool, d).await.map_err(RelayError::from)?
    } else if let Some(u) = &uid_digest {
        account::find_by_uid_digest(pool, u).await.map_err(RelayError::from)?
    } else {
        return Err(RelayError::BadRequest {
            message: "one of uidHex, accountToken, accountDigest is required".into(),
        });
    };

    if let Some(acc) = existing {
        if let Some(t) = token {
            if acc.account_token != t {
                return Err(RelayError::NotFound {
                    resource: "account".into(),
                });
            }
        }
        return Ok(ResolveAccountResult {
            account: acc,
            newly_created: false,
        });
    }

    if !input.allow_create {
        return Err(RelayError::NotFound {
            resource: "account".into(),
        });
    }

    let new_token = token
        .map(str::to_string)
        .unwrap_or_else(|| crypto::generate_account_token(config.accounts.token_len_bytes, config.accounts.token_len_bytes_max));
    let new_digest = digest.unwrap_or_else(|| crypto::sha256_hex_upper(new_token.as_bytes()));
    // No uid presented: create from the token/digest alone, with
    // uid_digest falling back to the account's own digest.
    let uid_digest = uid_digest.unwrap_or_else(|| new_digest.clone());

    match account::insert_new(pool, &new_digest, &new_token, &uid_digest).await {
        Ok(acc) => Ok(ResolveAccountResult {
            account: acc,
            newly_created: true,
        }),
        Err(err) => {
            // Lost a race against a concurrent creator — re-select.
            let sqlx_err = err.downcast::<sqlx::Error>().map_err(RelayError::Internal)?;
            if !error::is_unique_violation(&sqlx_err) {
                return Err(RelayError::Database(sqlx_err));
            }
            let acc = account::find_by_digest(pool, &new_digest)
                .await
                .map_err(RelayError::from)?
                .or(account::find_by_uid_digest(pool, &uid_digest).await.map_err(RelayError::from)?)
                .ok_or(RelayError::Conflict)?;
            Ok(ResolveAccountResult {
                account: acc,
                newly_created: false,
            })
        }
    }
}

/// Decode the 64 hex-char HMAC account key from config.
fn account_key(config: &AppConfig) -> RelayResult<Vec<u8>> {
    hex::decode(&config.hmac.account_key_hex).map_err(|_| RelayError::BadRequest {
        message: "server misconfigured: invalid account_key_hex".into(),
    })
}
