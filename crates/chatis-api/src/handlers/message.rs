//! Conversation history and read-state handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};

use chatis_core::error::AppError;
use chatis_core::types::UserId;
use chatis_database::store::{MessageStore, UserStore};
use chatis_entity::message::MessageRecord;
use chatis_entity::user::UserProfile;

use crate::dto::response::{ApiResponse, MarkReadResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/messages/{user_id}
///
/// Conversation with `user_id`, oldest first.
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(peer_id): Path<UserId>,
) -> Result<Json<ApiResponse<Vec<MessageRecord>>>, ApiError> {
    let peer = state
        .users
        .find_by_id(peer_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let me = state
        .users
        .find_by_id(auth.user_id)
        .await?
        .map(|user| user.profile())
        .unwrap_or_else(|| auth.profile());

    let profiles: HashMap<UserId, UserProfile> =
        [(me.id, me), (peer.id, peer.profile())].into_iter().collect();

    let records = state
        .messages
        .conversation(auth.user_id, peer_id)
        .await?
        .into_iter()
        .filter_map(|message| {
            let sender = profiles.get(&message.sender_id)?.clone();
            let receiver = profiles.get(&message.receiver_id)?.clone();
            Some(message.into_record(sender, receiver))
        })
        .collect();

    Ok(Json(ApiResponse::ok(records)))
}

/// PUT /api/messages/read/{user_id}
///
/// Mark everything `user_id` sent the caller as read.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(peer_id): Path<UserId>,
) -> Result<Json<ApiResponse<MarkReadResponse>>, ApiError> {
    let updated = state.messages.mark_read(peer_id, auth.user_id).await?;
    tracing::debug!(reader = %auth.user_id, sender = %peer_id, updated, "Messages marked read");

    Ok(Json(ApiResponse::ok(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        updated,
    })))
}
