//! Contact-secret backup store/fetch, with the `withDrState` regression
//! guard and trim-to-N retention.

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::backup::{ContactSecretsBackup, FetchBackupQuery, StoreBackupRequest, StoreBackupResponse};
use relaycore_db::repository::backup;
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/contact-secrets/backup", post(store).get(fetch))
}

async fn store(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StoreBackupRequest>,
) -> RelayResult<Json<StoreBackupResponse>> {
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;

    let max_seen = backup::max_with_dr_state(&state.db.pool, &digest).await.map_err(RelayError::Internal)?;
    if body.with_dr_state < max_seen {
        return Err(RelayError::ContactSecretsBackupRejected);
    }

    let version = match body.version {
        Some(v) => v,
        None => backup::next_version(&state.db.pool, &digest).await.map_err(RelayError::Internal)?,
    };
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

async fn fetch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchBackupQuery>,
) -> RelayResult<Json<Vec<ContactSecretsBackup>>> {
    let digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;
    let rows = backup::list(&state.db.pool, &digest, query.limit).await.map_err(RelayError::Internal)?;
    Ok(Json(rows))
}
