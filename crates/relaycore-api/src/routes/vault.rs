//! Message-key vault: put/get/latest-state/delete/count.
//!
//! `get` enforces wrap-context binding: the caller's `wrap_context` must
//! match the stored one byte-for-byte, or the vault entry is treated as
//! unavailable to that caller.

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::vault::{
    FetchVaultEntryQuery, StoreVaultEntryRequest, StoreVaultEntryResponse, VaultEntry,
};
use relaycore_db::repository::vault;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/message-key-vault/put", post(put))
        .route("/message-key-vault/get", post(get))
        .route("/message-key-vault/latest-state", post(latest_state))
        .route("/message-key-vault/delete", post(delete))
        .route("/message-key-vault/count", post(count))
}

async fn put(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StoreVaultEntryRequest>,
) -> RelayResult<Json<StoreVaultEntryResponse>> {
    let message_id = relaycore_common::normalize::normalize_message_id(&body.message_id)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;
    let target_device_id = body
        .target_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;
    let direction = relaycore_common::normalize::normalize_direction(&body.direction)?;

    relaycore_common::normalize::validate_wrapped_envelope(&body.wrapped_key_b64)?;
    relaycore_common::normalize::validate_wrap_context(
        &body.wrap_context,
        &conversation_id,
        &message_id,
        &device_id,
        target_device_id.as_deref(),
        &body.direction,
    )?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;

    vault::upsert(
        &state.db.pool,
        &digest,
        &conversation_id,
        &message_id,
        &device_id,
        direction,
        &body.wrapped_key_b64,
        &body.wrap_context,
        body.dr_state_snapshot.as_deref(),
    )
    .await
    .map_err(RelayError::Internal)?;

    Ok(Json(StoreVaultEntryResponse { ok: true }))
}

async fn get(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FetchVaultEntryQuery>,
) -> RelayResult<Json<VaultEntry>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let account_digest = relaycore_common::normalize::normalize_account_digest(&body.account_digest)?;

    let entry = match (&body.message_id, body.header_counter) {
        (Some(message_id), _) => {
            let message_id = relaycore_common::normalize::normalize_message_id(message_id)?;
            vault::find_by_message_id(&state.db.pool, &account_digest, &conversation_id, &message_id)
                .await
                .map_err(RelayError::Internal)?
        }
        (None, Some(header_counter)) => {
            vault::find_by_header_counter(&state.db.pool, &account_digest, &conversation_id, header_counter)
                .await
                .map_err(RelayError::Internal)?
        }
        (None, None) => {
            return Err(RelayError::BadRequest {
                message: "message_id or header_counter is required".into(),
            });
        }
    }
    .ok_or(RelayError::NotFound { resource: "vault entry".into() })?;

    if entry.wrap_context != body.wrap_context {
        return Err(RelayError::InvalidWrapContext);
    }

    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct LatestStateQuery {
    account_digest: String,
    conversation_id: String,
    sender_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LatestStateResponse {
    outgoing: Option<VaultEntry>,
    incoming: Option<VaultEntry>,
}

async fn latest_state(
    State(state): State<Arc<AppState>>,
    Json(query): Json<LatestStateQuery>,
) -> RelayResult<Json<LatestStateResponse>> {
    let account_digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;
    let sender_device_id = query
        .sender_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;

    let (outgoing, incoming) = vault::latest_state(&state.db.pool, &account_digest, &conversation_id, sender_device_id.as_deref())
        .await
        .map_err(RelayError::Internal)?;

    Ok(Json(LatestStateResponse { outgoing, incoming }))
}

#[derive(Debug, Deserialize)]
struct DeleteVaultRequest {
    account_digest: String,
    conversation_id: String,
    message_id: String,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteVaultRequest>,
) -> RelayResult<Json<OkResponse>> {
    let account_digest = relaycore_common::normalize::normalize_account_digest(&body.account_digest)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let message_id = relaycore_common::normalize::normalize_message_id(&body.message_id)?;

    vault::delete_by_message_id(&state.db.pool, &account_digest, &conversation_id, &message_id)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct CountQuery {
    account_digest: String,
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: i64,
}

async fn count(
    State(state): State<Arc<AppState>>,
    Json(query): Json<CountQuery>,
) -> RelayResult<Json<CountResponse>> {
    let account_digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;

    let count = vault::count(&state.db.pool, &account_digest, &conversation_id)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(CountResponse { count }))
}
