//! Tags/MK exchange, device-key and OPAQUE pass-through storage, and the
//! account verify/evidence/purge surface.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::{ExchangeRequest, ExchangeResponse, ResolveAccountInput};
use relaycore_common::models::subscription::{PurgeAccountRequest, PurgeAccountResponse};
use relaycore_db::repository::{account, device, subscription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags/exchange", post(exchange))
        .route("/tags/store-mk", post(store_mk))
        .route("/devkeys/fetch", post(devkeys_fetch))
        .route("/devkeys/store", post(devkeys_store))
        .route("/opaque/store", post(opaque_store))
        .route("/opaque/fetch", post(opaque_fetch))
        .route("/accounts/verify", post(verify))
        .route("/accounts/created", get(created))
        .route("/accounts/purge", post(purge))
        .route("/account/evidence", get(evidence))
}

async fn exchange(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeRequest>,
) -> RelayResult<Json<ExchangeResponse>> {
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: body.uid_hex.clone(),
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: body.allow_create,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let acc = resolved.account;

    if !resolved.newly_created {
        let advanced = account::advance_ctr_if_greater(&state.db.pool, &acc.account_digest, body.ctr)
            .await
            .map_err(RelayError::from)?;
        if !advanced {
            return Err(RelayError::Replay { last_ctr: acc.last_ctr });
        }
    }

    let refreshed = account::find_by_digest(&state.db.pool, &acc.account_digest)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::Conflict)?;

    Ok(Json(ExchangeResponse {
        has_mk: refreshed.wrapped_mk_json.is_some(),
        account_token: refreshed.account_token,
        account_digest: refreshed.account_digest,
        uid_digest: refreshed.uid_digest,
        newly_created: resolved.newly_created,
        last_ctr: refreshed.last_ctr,
    }))
}

#[derive(Debug, Deserialize)]
struct StoreMkRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
    wrapped_mk_json: String,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn store_mk(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StoreMkRequest>,
) -> RelayResult<Json<OkResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    account::store_wrapped_mk(&state.db.pool, &digest, &body.wrapped_mk_json)
        .await
        .map_err(RelayError::from)?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct DevKeysStoreRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
    device_id: String,
    device_key_json: String,
}

async fn devkeys_store(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DevKeysStoreRequest>,
) -> RelayResult<Json<OkResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;
    device::store_device_key(&state.db.pool, &digest, &device_id, &body.device_key_json)
        .await
        .map_err(RelayError::from)?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct DevKeysFetchRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
    device_id: String,
}

#[derive(Debug, Serialize)]
struct DevKeysFetchResponse {
    device_key_json: Option<String>,
}

async fn devkeys_fetch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DevKeysFetchRequest>,
) -> RelayResult<Json<DevKeysFetchResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;
    let dev = device::find(&state.db.pool, &digest, &device_id)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::NotFound { resource: "device".into() })?;
    Ok(Json(DevKeysFetchResponse {
        device_key_json: dev.device_key_json,
    }))
}

#[derive(Debug, Deserialize)]
struct OpaqueStoreRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
    opaque_envelope: String,
}

async fn opaque_store(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OpaqueStoreRequest>,
) -> RelayResult<Json<OkResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    account::store_opaque_envelope(&state.db.pool, &digest, &body.opaque_envelope)
        .await
        .map_err(RelayError::from)?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct OpaqueFetchRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpaqueFetchResponse {
    opaque_envelope: Option<String>,
}

async fn opaque_fetch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OpaqueFetchRequest>,
) -> RelayResult<Json<OpaqueFetchResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    let acc = account::find_by_digest(&state.db.pool, &digest)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::NotFound { resource: "account".into() })?;
    Ok(Json(OpaqueFetchResponse {
        opaque_envelope: acc.opaque_envelope,
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    account_digest: Option<String>,
    account_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    verified: bool,
}

async fn verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> RelayResult<Json<VerifyResponse>> {
    let result = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await;
    Ok(Json(VerifyResponse { verified: result.is_ok() }))
}

#[derive(Debug, Deserialize)]
struct CreatedQuery {
    account_digest: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    created_at: i64,
}

async fn created(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CreatedQuery>,
) -> RelayResult<Json<CreatedResponse>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&q.account_digest)?;
    let acc = account::find_by_digest(&state.db.pool, &digest)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::NotFound { resource: "account".into() })?;
    Ok(Json(CreatedResponse { created_at: acc.created_at }))
}

#[derive(Debug, Deserialize)]
struct EvidenceQuery {
    account_digest: String,
}

#[derive(Debug, Serialize)]
struct EvidenceResponse {
    account_digest: String,
    created_at: i64,
    last_ctr: i64,
    has_mk: bool,
}

async fn evidence(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EvidenceQuery>,
) -> RelayResult<Json<EvidenceResponse>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&q.account_digest)?;
    let acc = account::find_by_digest(&state.db.pool, &digest)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::NotFound { resource: "account".into() })?;
    Ok(Json(EvidenceResponse {
        account_digest: acc.account_digest,
        created_at: acc.created_at,
        last_ctr: acc.last_ctr,
        has_mk: acc.wrapped_mk_json.is_some(),
    }))
}

async fn purge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PurgeAccountRequest>,
) -> RelayResult<Json<PurgeAccountResponse>> {
    let digest = require_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    let results = subscription::purge_account(&state.db.pool, &digest).await;
    Ok(Json(PurgeAccountResponse {
        ok: true,
        tables_cleared: results.into_iter().map(|(name, _)| name).collect(),
    }))
}

/// Resolve a caller-presented digest/token pair to a known account digest,
/// without permission to create.
async fn require_digest(
    state: &AppState,
    account_digest: Option<&str>,
    account_token: Option<&str>,
) -> RelayResult<String> {
    if account_digest.is_none() && account_token.is_none() {
        return Err(RelayError::Unauthorized);
    }
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: account_token.map(str::to_string),
        account_digest: account_digest.map(str::to_string),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    Ok(resolved.account.account_digest)
}
