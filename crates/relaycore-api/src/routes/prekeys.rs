//! X3DH-style prekey bundle publish and fetch.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::prekey::{
    OpkPublic, PrekeyBundle, PublishPrekeysRequest, PublishPrekeysResponse,
};
use relaycore_db::repository::{device, prekey};
use serde::Deserialize;
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/prekeys/publish", post(publish))
        .route("/prekeys/bundle", get(bundle))
}

async fn publish(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PublishPrekeysRequest>,
) -> RelayResult<Json<PublishPrekeysResponse>> {
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;

    if !relaycore_common::crypto::verify_signed_prekey(&body.ik_pub, &body.spk_pub, &body.spk_sig) {
        return Err(RelayError::BadRequest {
            message: "signed prekey signature does not verify against ik_pub".into(),
        });
    }

    device::upsert(&state.db.pool, &digest, &device_id, None)
        .await
        .map_err(RelayError::from)?;

    prekey::upsert_signed_prekey(
        &state.db.pool,
        &digest,
        &device_id,
        body.spk_id,
        &body.spk_pub,
        &body.spk_sig,
        &body.ik_pub,
    )
    .await
    .map_err(RelayError::from)?;

    if !body.one_time_prekeys.is_empty() {
        prekey::insert_one_time_prekeys(&state.db.pool, &digest, &device_id, &body.one_time_prekeys)
            .await
            .map_err(RelayError::from)?;
    }

    let next_opk_id = prekey::next_opk_id(&state.db.pool, &digest, &device_id)
        .await
        .map_err(RelayError::from)?;

    Ok(Json(PublishPrekeysResponse { next_opk_id }))
}

#[derive(Debug, Deserialize)]
struct BundleQuery {
    account_digest: String,
    device_id: Option<String>,
}

async fn bundle(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BundleQuery>,
) -> RelayResult<Json<PrekeyBundle>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&q.account_digest)?;

    let device_id = match &q.device_id {
        Some(d) => relaycore_common::normalize::normalize_device_id(d)?,
        None => {
            let dev = device::most_recent(&state.db.pool, &digest)
                .await
                .map_err(RelayError::from)?
                .ok_or(RelayError::NotFound { resource: "device".into() })?;
            dev.device_id
        }
    };

    let spk = prekey::most_recent_signed_prekey(&state.db.pool, &digest, &device_id)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::PrekeyUnavailable)?;
    let ik_pub = spk.ik_pub.ok_or(RelayError::PrekeyUnavailable)?;

    let opk = prekey::consume_one_time_prekey(&state.db.pool, &digest, &device_id)
        .await
        .map_err(RelayError::from)?
        .ok_or(RelayError::PrekeyUnavailable)?;

    Ok(Json(PrekeyBundle {
        account_digest: digest,
        device_id,
        ik_pub,
        spk_id: spk.spk_id,
        spk_pub: spk.spk_pub,
        spk_sig: spk.spk_sig,
        opk: Some(OpkPublic {
            opk_id: opk.opk_id,
            opk_pub: opk.opk_pub,
        }),
    }))
}
