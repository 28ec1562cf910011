//! Invite dropbox rendezvous: create (owner) -> deliver (sender) -> consume
//! (owner). Expired, undelivered slots are promoted to `EXPIRED` lazily on
//! read, the way the status/consume paths observe them.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::invite::{
    ConsumeInviteRequest, ConsumeInviteResponse, CreateInviteRequest, CreateInviteResponse,
    DeliverInviteRequest, DeliverInviteResponse, InviteStatusQuery, InviteStatusResponse,
    CONSUME_KEYS, CREATE_KEYS, DELIVER_KEYS, STATUS_CONSUMED, STATUS_DELIVERED,
};
use relaycore_common::models::prekey::{OpkPublic, PrekeyBundle};
use relaycore_db::repository::{invite, prekey};
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

fn checked<T: serde::de::DeserializeOwned>(raw: serde_json::Value, allowed: &[&str]) -> RelayResult<T> {
    relaycore_common::normalize::check_exact_keys(&raw, allowed)?;
    serde_json::from_value(raw).map_err(|err| RelayError::BadRequest { message: err.to_string() })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/invites/create", post(create))
        .route("/invites/deliver", post(deliver))
        .route("/invites/consume", post(consume))
        .route("/invites/status", get(status))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> RelayResult<Json<CreateInviteResponse>> {
    let body: CreateInviteRequest = checked(raw, CREATE_KEYS)?;
    let invite_id = relaycore_common::normalize::normalize_invite_id(&body.invite_id)?;
    let owner_device_id = relaycore_common::normalize::normalize_device_id(&body.owner_device_id)?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.owner_account_token.clone(),
        account_digest: body.owner_account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let owner_digest = resolved.account.account_digest;

    if invite::find(&state.db.pool, &invite_id).await.map_err(RelayError::Internal)?.is_some() {
        return Err(RelayError::InviteAlreadyExists);
    }

    if let Some(spk) = prekey::most_recent_signed_prekey(&state.db.pool, &owner_digest, &owner_device_id)
        .await
        .map_err(RelayError::Internal)?
    {
        if spk.spk_pub != body.owner_public_key_b64 {
            return Err(RelayError::BadRequest {
                message: "owner_public_key_b64 does not match the device's signed prekey".into(),
            });
        }
    }

    let opk = prekey::consume_one_time_prekey(&state.db.pool, &owner_digest, &owner_device_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::PrekeyUnavailable)?;
    let spk = prekey::most_recent_signed_prekey(&state.db.pool, &owner_digest, &owner_device_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::PrekeyUnavailable)?;

    let ttl = body.ttl_secs.unwrap_or(config.invites.window_secs).min(config.invites.window_secs);
    let expires_at = chrono::Utc::now().timestamp() + ttl;

    let row = invite::create(&state.db.pool, &invite_id, &owner_digest, &owner_device_id, &body.owner_public_key_b64, expires_at)
        .await
        .map_err(|err| relaycore_common::error::map_unique_violation(err, RelayError::InviteAlreadyExists))?;

    Ok(Json(CreateInviteResponse {
        invite_id: row.invite_id,
        expires_at: row.expires_at,
        prekey_bundle: PrekeyBundle {
            account_digest: owner_digest,
            device_id: owner_device_id,
            ik_pub: spk.ik_pub.unwrap_or_default(),
            spk_id: spk.spk_id,
            spk_pub: spk.spk_pub,
            spk_sig: spk.spk_sig,
            opk: Some(OpkPublic { opk_id: opk.opk_id, opk_pub: opk.opk_pub }),
        },
    }))
}

async fn deliver(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> RelayResult<Json<DeliverInviteResponse>> {
    let body: DeliverInviteRequest = checked(raw, DELIVER_KEYS)?;
    let invite_id = relaycore_common::normalize::normalize_invite_id(&body.invite_id)?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.delivered_by_device_id)?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.delivered_by_account_token.clone(),
        account_digest: body.delivered_by_account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;

    invite::promote_expired(&state.db.pool, &invite_id).await.map_err(RelayError::Internal)?;

    let row = invite::find(&state.db.pool, &invite_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "invite".into() })?;

    if row.status == STATUS_DELIVERED || row.status == STATUS_CONSUMED {
        return Err(RelayError::InviteAlreadyDelivered { delivered_at: row.delivered_at });
    }
    if row.status != relaycore_common::models::invite::STATUS_CREATED {
        return Err(RelayError::Expired);
    }
    if body.expires_at != row.expires_at {
        return Err(RelayError::BadRequest {
            message: "expires_at does not match the invite's stored window".into(),
        });
    }

    let won = invite::deliver(&state.db.pool, &invite_id, &digest, &device_id, &body.envelope_b64)
        .await
        .map_err(RelayError::Internal)?;

    if !won {
        // Lost the race or the window closed between our checks and the
        // conditional update — reload and report precisely.
        let row = invite::find(&state.db.pool, &invite_id)
            .await
            .map_err(RelayError::Internal)?
            .ok_or(RelayError::NotFound { resource: "invite".into() })?;
        if row.status == STATUS_DELIVERED || row.status == STATUS_CONSUMED {
            return Err(RelayError::InviteAlreadyDelivered { delivered_at: row.delivered_at });
        }
        return Err(RelayError::Expired);
    }

    Ok(Json(DeliverInviteResponse { ok: true }))
}

async fn consume(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> RelayResult<Json<ConsumeInviteResponse>> {
    let body: ConsumeInviteRequest = checked(raw, CONSUME_KEYS)?;
    let invite_id = relaycore_common::normalize::normalize_invite_id(&body.invite_id)?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.owner_account_token.clone(),
        account_digest: body.owner_account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let caller_digest = resolved.account.account_digest;

    let row = invite::find(&state.db.pool, &invite_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "invite".into() })?;

    if row.owner_account_digest != caller_digest {
        return Err(RelayError::Forbidden);
    }
    if row.status != STATUS_DELIVERED && row.status != STATUS_CONSUMED {
        return Err(RelayError::NotFound { resource: "invite envelope".into() });
    }

    let envelope = row.ciphertext_json.clone().ok_or(RelayError::InviteEnvelopeInvalid)?;

    if row.status == STATUS_DELIVERED {
        invite::consume(&state.db.pool, &invite_id).await.map_err(RelayError::Internal)?;
    }

    Ok(Json(ConsumeInviteResponse { envelope_b64: envelope }))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InviteStatusQuery>,
) -> RelayResult<Json<InviteStatusResponse>> {
    let invite_id = relaycore_common::normalize::normalize_invite_id(&query.invite_id)?;
    invite::promote_expired(&state.db.pool, &invite_id).await.map_err(RelayError::Internal)?;

    let row = invite::find(&state.db.pool, &invite_id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "invite".into() })?;

    Ok(Json(InviteStatusResponse {
        status: row.status,
        expires_at: row.expires_at,
    }))
}
