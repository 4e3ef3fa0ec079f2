//! Admin user-management handlers. All routes require the configured admin
//! identity; enforcement of a block is lazy, happening on the target's next
//! authenticated request.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use myhub_shared::constants::DEFAULT_BLOCK_REASON;
use myhub_shared::UserId;
use myhub_store::User;

use crate::api::AppState;
use crate::auth::AdminUser;
use crate::error::ServerError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub ip_address: Option<String>,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub last_login: String,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id.to_string(),
            user_name: u.user_name,
            user_avatar: u.user_avatar,
            ip_address: u.ip_address,
            is_blocked: u.is_blocked,
            block_reason: u.block_reason,
            last_login: u.last_login.to_rfc3339(),
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    pub reason: Option<String>,
}

/// `GET /api/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    let users: Vec<UserDto> = state
        .store
        .list_users()?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(serde_json::json!({ "users": users })))
}

/// `POST /api/admin/users/:id/block`
pub async fn block_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
    body: Option<Json<BlockRequest>>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let target = UserId::from(user_id);
    let reason = body
        .and_then(|Json(b)| b.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());

    if !state.store.block_user(&target, &reason)? {
        return Err(ServerError::NotFound("User not found".to_string()));
    }

    tracing::info!(user = %target, admin = %admin.0.identity.id, %reason, "user blocked");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /api/admin/users/:id/unblock`
pub async fn unblock_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let target = UserId::from(user_id);
    if !state.store.unblock_user(&target)? {
        return Err(ServerError::NotFound("User not found".to_string()));
    }

    tracing::info!(user = %target, admin = %admin.0.identity.id, "user unblocked");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `DELETE /api/admin/users/:id` -- remove the user, their conversation,
/// and every message they sent.
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let target = UserId::from(user_id);
    if !state.store.delete_user(&target)? {
        return Err(ServerError::NotFound("User not found".to_string()));
    }

    tracing::info!(user = %target, admin = %admin.0.identity.id, "user deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
