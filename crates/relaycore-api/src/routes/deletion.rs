//! Deletion cursors and the encrypted per-conversation tombstone log.
//!
//! `min_counter` is the same cursor the message list-read path consults
//! (see `messages::list`); advancing it hides already-synced rows from
//! that account on read rather than deleting them out from under an
//! in-flight sync. The tombstone log is a separate, append-only record of
//! opaque "this conversation was cleared locally" checkpoints used for
//! cross-device replay.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::deletion::{
    AdvanceCursorRequest, AdvanceCursorResponse, AppendDeletionLogRequest, DeletionLogQuery,
    DeletionLogResponse,
};
use relaycore_db::repository::deletion;
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deletion/cursor", post(advance_cursor))
        .route("/deletion/log", post(append_log).get(read_log))
}

async fn advance_cursor(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdvanceCursorRequest>,
) -> RelayResult<Json<AdvanceCursorResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;

    deletion::advance_cursor(&state.db.pool, &conversation_id, &digest, body.min_counter)
        .await
        .map_err(RelayError::Internal)?;
    let min_counter = deletion::cursor_for(&state.db.pool, &conversation_id, &digest)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(AdvanceCursorResponse { ok: true, min_counter }))
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

async fn append_log(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AppendDeletionLogRequest>,
) -> RelayResult<Json<OkResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let digest = resolve_digest(&state, body.account_digest.as_deref(), body.account_token.as_deref()).await?;

    deletion::append_log(&state.db.pool, &digest, &conversation_id, &body.encrypted_checkpoint)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(OkResponse { ok: true }))
}

async fn read_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeletionLogQuery>,
) -> RelayResult<Json<DeletionLogResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;
    let account_digest = relaycore_common::normalize::normalize_account_digest(&query.account_digest)?;

    let entries = deletion::read_log(&state.db.pool, &account_digest, &conversation_id, query.since)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(DeletionLogResponse { entries }))
}

async fn resolve_digest(state: &AppState, account_digest: Option<&str>, account_token: Option<&str>) -> RelayResult<String> {
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
