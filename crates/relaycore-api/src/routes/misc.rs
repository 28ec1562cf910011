//! Odds and ends that don't carry enough surface area to warrant their own
//! module: media usage accounting, conversation authorization checks,
//! subscription/token redemption, device upsert/check, and contact
//! snapshots (the latter piggybacking on the contact-secret backup store).

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::backup::{ContactSecretsBackup, StoreBackupRequest, StoreBackupResponse};
use relaycore_common::models::conversation::{AuthorizeConversationRequest, AuthorizeConversationResponse};
use relaycore_common::models::device::{Device, UpsertDeviceRequest};
use relaycore_common::models::media::{MediaUsageResponse, RecordMediaUsageRequest};
use relaycore_common::models::subscription::{
    RedeemTokenRequest, RedeemTokenResponse, SubscriptionStatusQuery, SubscriptionStatusResponse,
    TokenStatusQuery, TokenStatusResponse,
};
use relaycore_db::repository::{backup, conversation, device, media, subscription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media/usage", post(media_usage))
        .route("/conversations/authorize", post(authorize_conversation))
        .route("/subscription/redeem", post(redeem))
        .route("/subscription/status", get(subscription_status))
        .route("/subscription/token-status", get(token_status))
        .route("/devices/upsert", post(devices_upsert))
        .route("/devices/check", get(devices_check))
        .route("/devices/active", get(devices_active))
        .route("/contacts/upsert", post(contacts_upsert))
        .route("/contacts/snapshot", get(contacts_snapshot))
}

async fn resolve_digest(state: &AppState, account_digest: Option<&str>, account_token: Option<&str>) -> RelayResult<String> {
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

async fn media_usage(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecordMediaUsageRequest>,
) -> RelayResult<Json<MediaUsageResponse>> {
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    media::record(&state.db.pool, &digest, &body.object_key, body.bytes)
        .await
        .map_err(RelayError::Internal)?;
    let total_bytes = media::total_bytes(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    Ok(Json(MediaUsageResponse { total_bytes }))
}

async fn authorize_conversation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AuthorizeConversationRequest>,
) -> RelayResult<Json<AuthorizeConversationResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;

    let role = conversation::role_of(&state.db.pool, &conversation_id, &digest)
        .await
        .map_err(RelayError::Internal)?;

    Ok(Json(AuthorizeConversationResponse {
        authorized: role.is_some(),
        role,
    }))
}

async fn redeem(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RedeemTokenRequest>,
) -> RelayResult<Json<RedeemTokenResponse>> {
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;

    if let Some(existing) = subscription::find_token(&state.db.pool, &body.token_id).await.map_err(RelayError::Internal)? {
        if existing.status == "used" {
            return Err(RelayError::TokenUsed {
                used_at: existing.used_at,
                used_by_digest: existing.used_by_digest,
            });
        }
    }

    let current_expiry = subscription::current_expiry(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    let now = chrono::Utc::now().timestamp();
    let base = current_expiry.max(now);
    let new_expires = base + body.duration_days * 86_400;

    if body.dry_run {
        return Ok(Json(RedeemTokenResponse {
            ok: true,
            expires_at: new_expires,
            dry_run: true,
        }));
    }

    subscription::redeem(
        &state.db.pool,
        &digest,
        new_expires,
        &body.token_id,
        now,
        body.duration_days,
        &body.nonce,
        &body.key_id,
        &body.signature_b64,
    )
    .await
    .map_err(RelayError::Internal)?;

    Ok(Json(RedeemTokenResponse {
        ok: true,
        expires_at: new_expires,
        dry_run: false,
    }))
}

async fn subscription_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscriptionStatusQuery>,
) -> RelayResult<Json<SubscriptionStatusResponse>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let expires_at = subscription::subscription_status(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    Ok(Json(SubscriptionStatusResponse { expires_at }))
}

async fn token_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenStatusQuery>,
) -> RelayResult<Json<TokenStatusResponse>> {
    let row = subscription::find_token(&state.db.pool, &query.token_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "token".into() })?;
    Ok(Json(TokenStatusResponse {
        status: row.status,
        used_at: row.used_at,
        used_by_digest: row.used_by_digest,
    }))
}

async fn devices_upsert(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertDeviceRequest>,
) -> RelayResult<Json<Device>> {
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;

    let row = device::upsert(&state.db.pool, &digest, &device_id, body.label.as_deref())
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
struct DeviceQuery {
    account_digest: String,
    device_id: String,
}

#[derive(Debug, Serialize)]
struct DeviceCheckResponse {
    exists: bool,
}

async fn devices_check(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> RelayResult<Json<DeviceCheckResponse>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let device_id = relaycore_common::normalize::normalize_device_id(&query.device_id)?;
    let exists = device::find(&state.db.pool, &digest, &device_id).await.map_err(RelayError::Internal)?.is_some();
    Ok(Json(DeviceCheckResponse { exists }))
}

#[derive(Debug, Serialize)]
struct DeviceActiveResponse {
    active: bool,
}

async fn devices_active(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> RelayResult<Json<DeviceActiveResponse>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let device_id = relaycore_common::normalize::normalize_device_id(&query.device_id)?;
    let active = device::is_active(&state.db.pool, &digest, &device_id).await.map_err(RelayError::Internal)?;
    Ok(Json(DeviceActiveResponse { active }))
}

/// Contacts upsert is grounded in the same versioned, regression-guarded
/// backup store as `backup/contact-secrets` — a contacts snapshot is just
/// another opaque per-account blob with the same anti-regression contract.
async fn contacts_upsert(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StoreBackupRequest>,
) -> RelayResult<Json<StoreBackupResponse>> {
    let config = relaycore_common::config::get();
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;

    let max_seen = backup::max_with_dr_state(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    if body.with_dr_state < max_seen {
        return Err(RelayError::ContactSecretsBackupRejected);
    }

    let version = backup::next_version(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    let row = backup::insert(
        &state.db.pool,
        &digest,
        version,
        &body.blob_b64,
        body.with_dr_state,
        body.device_label.as_deref(),
        body.device_id.as_deref(),
    )
    .await
    .map_err(RelayError::Database)?;

    backup::trim(&state.db.pool, &digest, config.limits.contact_secret_backup_retain)
        .await
        .map_err(RelayError::Internal)?;

    Ok(Json(StoreBackupResponse { ok: true, version: row.version }))
}

#[derive(Debug, Deserialize)]
struct ContactsSnapshotQuery {
    account_digest: String,
}

async fn contacts_snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactsSnapshotQuery>,
) -> RelayResult<Json<ContactSecretsBackup>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let rows = backup::list(&state.db.pool, &digest, 1).await.map_err(RelayError::Internal)?;
    let row = rows.into_iter().next().ok_or(RelayError::NotFound { resource: "contacts snapshot".into() })?;
    Ok(Json(row))
}
