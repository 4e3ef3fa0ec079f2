//! Conversation and message handlers.
//!
//! Every operation re-derives visibility from the request identity: admins
//! see everything, everyone else only the conversation they own. Ownership
//! is always checked before any data is returned.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use myhub_store::{Conversation, ConversationStatus, Message, StoreError};

use crate::api::AppState;
use crate::auth::{AdminUser, AuthedUser};
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: String,
    pub status: ConversationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Conversation> for ConversationDto {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id.to_string(),
            user_id: c.user_id.to_string(),
            user_name: c.user_name,
            user_avatar: c.user_avatar,
            last_message: c.last_message,
            last_message_at: c.last_message_at.to_rfc3339(),
            status: c.status,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            id: m.id.to_string(),
            conversation_id: m.conversation_id.to_string(),
            sender_id: m.sender_id.to_string(),
            sender_name: m.sender_name,
            sender_avatar: m.sender_avatar,
            content: m.content,
            is_admin: m.is_admin,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationDto>,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Only messages created after this instant (for polling clients).
    pub since: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Admins see every conversation; everyone else only their own.
fn ensure_visible(user: &AuthedUser, conversation: &Conversation) -> Result<(), ServerError> {
    if user.is_admin || conversation.user_id == user.identity.id {
        Ok(())
    } else {
        Err(ServerError::Forbidden("Forbidden".to_string()))
    }
}

fn conversation_not_found(err: StoreError) -> ServerError {
    match err {
        StoreError::NotFound => ServerError::NotFound("Conversation not found".to_string()),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/conversations`
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<ConversationListResponse>, ServerError> {
    let conversations = if user.is_admin {
        state.store.list_conversations()?
    } else {
        state.store.list_conversations_for_owner(&user.identity.id)?
    };

    Ok(Json(ConversationListResponse {
        conversations: conversations.into_iter().map(Into::into).collect(),
        is_admin: user.is_admin,
    }))
}

/// `POST /api/conversations` -- get-or-create the caller's conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: AuthedUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    let conversation = state.store.get_or_create_conversation(
        &user.identity.id,
        &user.identity.username,
        user.identity.avatar_url.as_deref(),
    )?;
    Ok(Json(
        serde_json::json!({ "conversation": ConversationDto::from(conversation) }),
    ))
}

/// `GET /api/conversations/:id`
pub async fn get_conversation(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let conversation = state
        .store
        .get_conversation(id)
        .map_err(conversation_not_found)?;
    ensure_visible(&user, &conversation)?;

    Ok(Json(
        serde_json::json!({ "conversation": ConversationDto::from(conversation) }),
    ))
}

/// `GET /api/conversations/:id/messages`
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    // Visibility first; existence and ownership are never leaked through
    // the message list.
    let conversation = state
        .store
        .get_conversation(id)
        .map_err(conversation_not_found)?;
    ensure_visible(&user, &conversation)?;

    let messages = match query.since {
        Some(since) => state.store.list_messages_since(id, since)?,
        None => state.store.list_messages(id)?,
    };

    let dtos: Vec<MessageDto> = messages.into_iter().map(Into::into).collect();
    Ok(Json(serde_json::json!({ "messages": dtos })))
}

/// `POST /api/conversations/:id/messages`
///
/// Sends carry their own, tighter rate window on top of the general API
/// limiter, checked here against the client address.
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthedUser,
    connect_info: Option<ConnectInfo<std::net::SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if let Some(ip) = crate::rate_limit::client_ip_from_headers(&headers, connect_info.map(|c| c.0))
    {
        if !state.message_limiter.check(ip).await {
            tracing::warn!(%ip, "message rate limit exceeded");
            return Err(ServerError::TooManyRequests);
        }
    }

    let content = request.content.trim();
    if content.is_empty() {
        return Err(ServerError::BadRequest(
            "Message content is required".to_string(),
        ));
    }

    let message = Message::new(
        id,
        user.identity.id.clone(),
        user.identity.username.clone(),
        user.identity.avatar_url.clone(),
        content.to_string(),
        user.is_admin,
    );

    // Ownership, open-status, insert, and summary update are one
    // transaction inside the store.
    state.store.send_message(&message).map_err(|e| match e {
        StoreError::NotFound => ServerError::NotFound("Conversation not found".to_string()),
        other => other.into(),
    })?;

    Ok(Json(
        serde_json::json!({ "message": MessageDto::from(message) }),
    ))
}

/// `DELETE /api/conversations/:id` (admin)
pub async fn delete_conversation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.store.delete_conversation(id)? {
        return Err(ServerError::NotFound("Conversation not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `PATCH /api/conversations/:id/close` (admin)
pub async fn close_conversation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    set_status(&state, admin, id, ConversationStatus::Closed)
}

/// `PATCH /api/conversations/:id/reopen` (admin)
pub async fn reopen_conversation(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    set_status(&state, admin, id, ConversationStatus::Open)
}

fn set_status(
    state: &AppState,
    _admin: AdminUser,
    id: Uuid,
    status: ConversationStatus,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.store.set_conversation_status(id, status)? {
        return Err(ServerError::NotFound("Conversation not found".to_string()));
    }
    tracing::info!(conversation = %id, status = status.as_str(), "conversation status changed");
    Ok(Json(serde_json::json!({ "success": true })))
}
