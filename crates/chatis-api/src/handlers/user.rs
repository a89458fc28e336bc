//! User listing handlers.

use axum::Json;
use axum::extract::State;

use chatis_database::store::UserStore;
use chatis_entity::user::UserProfile;

use crate::dto::response::{ApiResponse, UserResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/users
///
/// Everyone except the caller, with live presence.
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let presence = &state.realtime.presence;
    let users = state
        .users
        .list_all()
        .await?
        .into_iter()
        .filter(|user| user.id != auth.user_id)
        .map(|user| UserResponse {
            is_online: presence.is_online(user.id),
            last_seen: presence.last_seen(user.id).or(user.last_seen),
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
        })
        .collect();

    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/users/online
///
/// Current presence snapshot.
pub async fn list_online(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<ApiResponse<Vec<UserProfile>>> {
    Json(ApiResponse::ok(state.realtime.presence.list_online()))
}
