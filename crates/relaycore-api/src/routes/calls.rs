//! Call signalling bookkeeping: upsert-only session rows and an
//! append/read event log. No media ever transits through these handlers —
//! they only persist who rang whom, the signalling payloads exchanged,
//! and why a call ended.

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::call::{
    CallEventRequest, ListCallEventsQuery, ListCallEventsResponse, UpsertCallSessionRequest,
    UpsertCallSessionResponse,
};
use relaycore_db::repository::call;
use serde::Serialize;
use std::sync::{atomic::Ordering, Arc};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/calls/session", post(upsert_session))
        .route("/calls/events", post(record_event).get(list_events))
}

async fn upsert_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertCallSessionRequest>,
) -> RelayResult<Json<UpsertCallSessionResponse>> {
    maybe_sweep_stale(&state).await;

    let call_id = relaycore_common::normalize::normalize_invite_id(&body.call_id)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let caller_device_id = relaycore_common::normalize::normalize_device_id(&body.caller_device_id)?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.caller_account_token.clone(),
        account_digest: body.caller_account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let caller_digest = resolved.account.account_digest;

    let row = call::start(&state.db.pool, &call_id, &conversation_id, &caller_digest, &caller_device_id)
        .await
        .map_err(RelayError::Database)?;

    let state_label = if let Some(end_reason) = body.end_reason.as_deref() {
        call::end(&state.db.pool, &call_id, Some(end_reason))
            .await
            .map_err(RelayError::Internal)?;
        "ended".to_string()
    } else {
        row.state
    };

    Ok(Json(UpsertCallSessionResponse {
        call_id: row.call_id,
        state: state_label,
        started_at: row.started_at,
    }))
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn record_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CallEventRequest>,
) -> RelayResult<Json<OkResponse>> {
    let call_id = relaycore_common::normalize::normalize_invite_id(&body.call_id)?;
    let device_id = relaycore_common::normalize::normalize_device_id(&body.device_id)?;

    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;

    call::record_event(&state.db.pool, &call_id, &digest, &device_id, &body.event, body.payload_b64.as_deref())
        .await
        .map_err(RelayError::Internal)?;

    Ok(Json(OkResponse { ok: true }))
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCallEventsQuery>,
) -> RelayResult<Json<ListCallEventsResponse>> {
    let call_id = relaycore_common::normalize::normalize_invite_id(&query.call_id)?;
    let events = call::list_events(&state.db.pool, &call_id).await.map_err(RelayError::Internal)?;
    Ok(Json(ListCallEventsResponse { events }))
}

/// Best-effort, process-lifetime throttled sweep of stale call sessions.
/// Runs lazily on a request rather than as a background task — this is a
/// stateless HTTP worker with no scheduler.
async fn maybe_sweep_stale(state: &AppState) {
    let config = relaycore_common::config::get();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
    let last = state.calls_cleanup_gate.load(Ordering::Relaxed);
    if now - last < config.calls.cleanup_throttle_secs {
        return;
    }
    if state.calls_cleanup_gate.compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed).is_err() {
        return;
    }
    if let Err(err) = call::cleanup_stale(&state.db.pool, config.calls.cleanup_throttle_secs).await {
        tracing::warn!(?err, "stale call session sweep failed");
    }
}
