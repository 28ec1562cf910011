//! Secure-message append, atomic send, and the list-read path.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::conversation::ROLE_MEMBER;
use relaycore_common::models::message::{
    ByCounterQuery, DeleteConversationRequest, DeleteMessageRequest, ListMessagesQuery,
    ListMessagesResponse, OutgoingStatusRequest, OutgoingStatusResponse, SecureMessage,
    SendMessageRequest, SendMessageResponse, SendStateRequest, SendStateResponse,
};
use relaycore_common::models::vault::{AtomicSendRequest, AtomicSendResponse};
use relaycore_db::repository::batch::{self, AtomicSendBackup, AtomicSendInput, AtomicSendOutcome};
use relaycore_db::repository::{conversation, message};
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", post(send).get(list))
        .route("/messages/by-counter", get(by_counter))
        .route("/messages/send-state", post(send_state))
        .route("/messages/secure/max-counter", post(send_state))
        .route("/messages/outgoing-status", post(outgoing_status))
        .route("/messages/delete", post(delete))
        .route("/messages/secure/delete-conversation", post(delete_conversation))
        .route("/messages/atomic-send", post(atomic_send))
}

async fn send(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendMessageRequest>,
) -> RelayResult<Json<SendMessageResponse>> {
    let id = relaycore_common::normalize::normalize_message_id(&body.id)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let sender_device_id = relaycore_common::normalize::normalize_device_id(&body.sender_device_id)?;
    let sender_digest = resolve_sender(&state, body.sender_account_digest.as_deref()).await?;
    let receiver_digest = relaycore_common::normalize::normalize_account_digest(&body.receiver_account_digest)?;
    let receiver_device_id = body
        .receiver_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;
    relaycore_common::normalize::validate_message_header(&body.header, &sender_device_id, body.counter)?;
    let header_json = body.header.to_string();

    let mut tx = state.db.pool.begin().await.map_err(RelayError::Database)?;
    conversation::ensure_conversation(&mut tx, &conversation_id)
        .await
        .map_err(RelayError::Internal)?;
    conversation::upsert_acl_tx(&mut tx, &conversation_id, &sender_digest, Some(&sender_device_id), ROLE_MEMBER)
        .await
        .map_err(RelayError::Internal)?;
    conversation::upsert_acl_tx(&mut tx, &conversation_id, &receiver_digest, receiver_device_id.as_deref(), ROLE_MEMBER)
        .await
        .map_err(RelayError::Internal)?;

    let max_counter = message::max_counter_tx(&mut tx, &conversation_id, &sender_digest, &sender_device_id)
        .await
        .map_err(RelayError::Internal)?;
    if body.counter <= max_counter {
        tx.rollback().await.map_err(RelayError::Database)?;
        return Err(RelayError::CounterTooLow { max_counter });
    }

    let inserted = message::insert_tx(
        &mut tx,
        &id,
        &conversation_id,
        &sender_digest,
        &sender_device_id,
        &receiver_digest,
        receiver_device_id.as_deref(),
        &header_json,
        &body.ciphertext_b64,
        body.counter,
    )
    .await;

    match inserted {
        Ok(row) => {
            tx.commit().await.map_err(RelayError::Database)?;
            Ok(Json(SendMessageResponse {
                ok: true,
                id: row.id,
                created_at: row.created_at,
            }))
        }
        Err(err) if relaycore_common::error::is_unique_violation(&err) => {
            tx.rollback().await.map_err(RelayError::Database)?;
            // A duplicate id is a retry of the same send — idempotent success.
            let existing = message::find_by_id(&state.db.pool, &id)
                .await
                .map_err(RelayError::Internal)?
                .ok_or(RelayError::Conflict)?;
            Ok(Json(SendMessageResponse {
                ok: true,
                id: existing.id,
                created_at: existing.created_at,
            }))
        }
        Err(err) => Err(RelayError::Database(err)),
    }
}

async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMessagesQuery>,
) -> RelayResult<Json<ListMessagesResponse>> {
    let config = relaycore_common::config::get();
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;
    let limit = query.limit.unwrap_or(config.limits.visible_message_limit).clamp(1, config.limits.visible_message_limit);

    let min_counter = if let Some(digest) = &query.requester_digest {
        let digest = relaycore_common::normalize::normalize_account_digest(digest)?;
        relaycore_db::repository::deletion::cursor_for(&state.db.pool, &conversation_id, &digest)
            .await
            .map_err(RelayError::Internal)?
    } else {
        0
    };

    let normalized_query = ListMessagesQuery {
        conversation_id: conversation_id.clone(),
        ..query
    };

    let (messages, next_cursor_counter, next_cursor_id) = message::list(
        &state.db.pool,
        &normalized_query,
        limit,
        config.limits.visible_message_iteration_cap,
        min_counter,
    )
    .await
    .map_err(RelayError::Internal)?;

    Ok(Json(ListMessagesResponse {
        messages,
        next_cursor_counter,
        next_cursor_id,
    }))
}

async fn by_counter(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByCounterQuery>,
) -> RelayResult<Json<SecureMessage>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;
    let sender_digest = relaycore_common::normalize::normalize_account_digest(&query.sender_account_digest)?;
    let sender_device_id = relaycore_common::normalize::normalize_device_id(&query.sender_device_id)?;

    let row = message::find_by_counter(&state.db.pool, &conversation_id, &sender_digest, &sender_device_id, query.counter)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "message".into() })?;
    Ok(Json(row))
}

async fn send_state(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendStateRequest>,
) -> RelayResult<Json<SendStateResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let sender_device_id = relaycore_common::normalize::normalize_device_id(&body.sender_device_id)?;
    let sender_digest = resolve_sender(&state, body.sender_account_digest.as_deref()).await?;

    let max_counter = message::max_counter(&state.db.pool, &conversation_id, &sender_digest, &sender_device_id)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(SendStateResponse { max_counter }))
}

async fn outgoing_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OutgoingStatusRequest>,
) -> RelayResult<Json<OutgoingStatusResponse>> {
    let id = relaycore_common::normalize::normalize_message_id(&body.id)?;
    let row = message::find_by_id(&state.db.pool, &id).await.map_err(RelayError::Internal)?;
    Ok(Json(OutgoingStatusResponse {
        committed: row.is_some(),
        created_at: row.map(|r| r.created_at),
    }))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteMessageRequest>,
) -> RelayResult<Json<SendMessageResponse>> {
    let id = relaycore_common::normalize::normalize_message_id(&body.id)?;
    let existing = message::find_by_id(&state.db.pool, &id)
        .await
        .map_err(RelayError::Internal)?
        .ok_or(RelayError::NotFound { resource: "message".into() })?;
    message::delete_by_id(&state.db.pool, &id).await.map_err(RelayError::Internal)?;
    Ok(Json(SendMessageResponse {
        ok: true,
        id: existing.id,
        created_at: existing.created_at,
    }))
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteConversationRequest>,
) -> RelayResult<Json<OkResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    message::delete_conversation(&state.db.pool, &conversation_id)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(OkResponse { ok: true }))
}

async fn atomic_send(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AtomicSendRequest>,
) -> RelayResult<Json<AtomicSendResponse>> {
    let config = relaycore_common::config::get();
    let msg = body.message;
    let vault_entry = body.vault_entry;

    let id = relaycore_common::normalize::normalize_message_id(&msg.id)?;
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&msg.conversation_id)?;
    let sender_device_id = relaycore_common::normalize::normalize_device_id(&msg.sender_device_id)?;
    let sender_digest = resolve_sender(&state, msg.sender_account_digest.as_deref()).await?;
    let receiver_digest = relaycore_common::normalize::normalize_account_digest(&msg.receiver_account_digest)?;
    let receiver_device_id = msg
        .receiver_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;
    relaycore_common::normalize::validate_message_header(&msg.header, &sender_device_id, msg.counter)?;
    let header_json = msg.header.to_string();
    let vault_device_id = relaycore_common::normalize::normalize_device_id(&vault_entry.device_id)?;
    let vault_target_device_id = vault_entry
        .target_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;
    let vault_direction = relaycore_common::normalize::normalize_direction(&vault_entry.direction)?;

    relaycore_common::normalize::validate_wrapped_envelope(&vault_entry.wrapped_key_b64)?;
    relaycore_common::normalize::validate_wrap_context(
        &vault_entry.wrap_context,
        &conversation_id,
        &id,
        &vault_device_id,
        vault_target_device_id.as_deref(),
        &vault_entry.direction,
    )?;

    let backup = match &body.backup {
        Some(b) => {
            let backup_digest = relaycore_common::normalize::normalize_account_digest(&b.account_digest)?;
            if backup_digest != sender_digest {
                return Err(RelayError::BadRequest {
                    message: "backup.account_digest must match the sender".into(),
                });
            }
            Some(AtomicSendBackup {
                payload_json: &b.blob_b64,
                with_dr_state: b.with_dr_state,
                device_label: b.device_label.as_deref(),
                device_id: b.device_id.as_deref(),
            })
        }
        None => None,
    };

    let input = AtomicSendInput {
        message_id: &id,
        conversation_id: &conversation_id,
        sender_account_digest: &sender_digest,
        sender_device_id: &sender_device_id,
        receiver_account_digest: &receiver_digest,
        receiver_device_id: receiver_device_id.as_deref(),
        header_json: &header_json,
        ciphertext_b64: &msg.ciphertext_b64,
        counter: msg.counter,
        vault_device_id: &vault_device_id,
        vault_direction,
        wrapped_key_b64: &vault_entry.wrapped_key_b64,
        wrap_context: &vault_entry.wrap_context,
        dr_state_snapshot: vault_entry.dr_state_snapshot.as_deref(),
        backup,
        backup_retain: config.limits.contact_secret_backup_retain,
    };

    match batch::atomic_send(&state.db.pool, input).await.map_err(RelayError::Internal)? {
        AtomicSendOutcome::Committed(row) => Ok(Json(AtomicSendResponse {
            ok: true,
            id: row.id,
            created_at: row.created_at,
        })),
        AtomicSendOutcome::Conflict => Err(RelayError::Conflict),
        AtomicSendOutcome::CounterTooLow(max_counter) => Err(RelayError::CounterTooLow { max_counter }),
    }
}

/// Resolve the sender's account digest. Message endpoints never create an
/// account implicitly — the digest must already name a known account.
async fn resolve_sender(state: &AppState, account_digest: Option<&str>) -> RelayResult<String> {
    let account_digest = account_digest.ok_or(RelayError::BadRequest {
        message: "sender_account_digest is required".into(),
    })?;
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: None,
        account_digest: Some(account_digest.to_string()),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    Ok(resolved.account.account_digest)
}
