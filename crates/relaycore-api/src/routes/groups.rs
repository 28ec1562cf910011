//! Group conversations — creation and membership management over the same
//! `conversation_acl` table 1:1 conversations use.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use relaycore_common::error::{RelayError, RelayResult};
use relaycore_common::models::account::ResolveAccountInput;
use relaycore_common::models::conversation::{
    ContactDeleteRequest, CreateGroupRequest, CreateGroupResponse, GroupMemberRequest, GroupView,
    ROLE_MEMBER, ROLE_OWNER,
};
use relaycore_db::repository::conversation;
use serde::Deserialize;
use std::sync::Arc;

use crate::{resolve::resolve_account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/groups/create", post(create))
        .route("/groups/members/add", post(add_member))
        .route("/groups/members/remove", post(remove_member))
        .route("/groups/get", get(get_group))
        .route("/friends/contact-delete", post(contact_delete))
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

async fn contact_delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContactDeleteRequest>,
) -> RelayResult<Json<OkResponse>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let contact_digest = relaycore_common::normalize::normalize_account_digest(&body.contact_account_digest)?;
    conversation::remove_member(&state.db.pool, &conversation_id, &contact_digest)
        .await
        .map_err(RelayError::Internal)?;
    Ok(Json(OkResponse { ok: true }))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateGroupRequest>,
) -> RelayResult<Json<CreateGroupResponse>> {
    let config = relaycore_common::config::get();
    let input = ResolveAccountInput {
        uid_hex: None,
        account_token: body.account_token.clone(),
        account_digest: body.account_digest.clone(),
        allow_create: false,
    };
    let resolved = resolve_account(&state.db.pool, config, &input).await?;
    let digest = resolved.account.account_digest;
    let device_id = body
        .device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;

    let conversation_id = relaycore_common::snowflake::generate_conversation_id();

    let mut tx = state.db.pool.begin().await.map_err(RelayError::Database)?;
    conversation::ensure_conversation(&mut tx, &conversation_id)
        .await
        .map_err(RelayError::Internal)?;
    conversation::upsert_acl_tx(&mut tx, &conversation_id, &digest, device_id.as_deref(), ROLE_OWNER)
        .await
        .map_err(RelayError::Internal)?;
    tx.commit().await.map_err(RelayError::Database)?;

    Ok(Json(CreateGroupResponse { conversation_id }))
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GroupMemberRequest>,
) -> RelayResult<Json<GroupView>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let member_digest = relaycore_common::normalize::normalize_account_digest(&body.member_account_digest)?;
    let member_device_id = body
        .member_device_id
        .as_deref()
        .map(relaycore_common::normalize::normalize_device_id)
        .transpose()?;
    let role = body.role.as_deref().unwrap_or(ROLE_MEMBER);

    conversation::upsert_acl(&state.db.pool, &conversation_id, &member_digest, member_device_id.as_deref(), role)
        .await
        .map_err(RelayError::Internal)?;

    let members = conversation::members(&state.db.pool, &conversation_id).await.map_err(RelayError::Internal)?;
    Ok(Json(GroupView { conversation_id, members }))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GroupMemberRequest>,
) -> RelayResult<Json<GroupView>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&body.conversation_id)?;
    let member_digest = relaycore_common::normalize::normalize_account_digest(&body.member_account_digest)?;

    conversation::remove_member(&state.db.pool, &conversation_id, &member_digest)
        .await
        .map_err(RelayError::Internal)?;

    let members = conversation::members(&state.db.pool, &conversation_id).await.map_err(RelayError::Internal)?;
    Ok(Json(GroupView { conversation_id, members }))
}

#[derive(Debug, Deserialize)]
struct GetGroupQuery {
    conversation_id: String,
}

async fn get_group(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetGroupQuery>,
) -> RelayResult<Json<GroupView>> {
    let conversation_id = relaycore_common::normalize::normalize_conversation_id(&query.conversation_id)?;
    let members = conversation::members(&state.db.pool, &conversation_id).await.map_err(RelayError::Internal)?;
    Ok(Json(GroupView { conversation_id, members }))
}
