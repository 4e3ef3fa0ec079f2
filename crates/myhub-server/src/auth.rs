//! Discord OAuth login and the request identity gate.
//!
//! The gate resolves "who is calling" exactly once per request through the
//! [`AuthedUser`] extractor and hands handlers an explicit identity plus
//! admin flag. The block flag is re-checked against the store on every
//! request (not cached in the session) because a block can land mid-session.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{header::SET_COOKIE, request::Parts, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use myhub_shared::constants::{DISCORD_API_BASE, DISCORD_AUTHORIZE_URL, DISCORD_TOKEN_URL};
use myhub_shared::{Identity, UserId};

use crate::api::AppState;
use crate::error::ServerError;
use crate::rate_limit::client_ip_from_headers;
use crate::session::{clear_session_cookie, session_cookie, session_token};

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// An authenticated, non-blocked caller. Rejects with 401 when no session
/// is present and 403 (destroying the session) when the user is blocked.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub identity: Identity,
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ServerError::Unauthenticated)?;
        let identity = state
            .sessions
            .get(&token)
            .await
            .ok_or(ServerError::Unauthenticated)?;

        if state.store.is_blocked(&identity.id)? {
            state.sessions.destroy(&token).await;
            return Err(ServerError::Forbidden(
                "Your account has been blocked. Please contact support.".to_string(),
            ));
        }

        let is_admin = state.config.is_admin(&identity.id);
        Ok(Self { identity, is_admin })
    }
}

/// An authenticated admin. 401 without a session, 403 for anyone but the
/// configured admin identity.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthedUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthedUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ServerError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

// ---------------------------------------------------------------------------
// Discord wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    global_name: Option<String>,
    avatar: Option<String>,
}

impl DiscordUser {
    fn into_identity(self) -> Identity {
        let id = UserId::from(self.id);
        let username = if self.username.is_empty() {
            self.global_name.unwrap_or_else(|| "Unknown".to_string())
        } else {
            self.username
        };
        let avatar_url = Identity::avatar_url_for(&id, self.avatar.as_deref());
        Identity {
            id,
            username,
            avatar_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /auth/discord` -- redirect the browser to the Discord consent page.
pub async fn discord_login(
    State(state): State<AppState>,
) -> Result<Redirect, ServerError> {
    let (client_id, _) = state
        .config
        .oauth_credentials()
        .ok_or(ServerError::NotConfigured("Discord OAuth"))?;

    let oauth_state = state.oauth_states.issue().await;
    let url = url::Url::parse_with_params(
        DISCORD_AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", state.config.discord_redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "identify email"),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|e| ServerError::Internal(format!("authorize URL: {e}")))?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /auth/callback` -- exchange the authorization code, upsert the user,
/// enforce the block flag, and open a session.
pub async fn discord_callback(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<std::net::SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ServerError> {
    let origin = &state.config.frontend_origin;

    if let Some(error) = query.error {
        warn!(%error, "OAuth consent denied");
        return Ok(Redirect::to(&format!("{origin}/messages")).into_response());
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Ok(Redirect::to(&format!("{origin}/messages")).into_response());
    };
    if !state.oauth_states.consume(&oauth_state).await {
        warn!("OAuth state mismatch or expired");
        return Ok(Redirect::to(&format!("{origin}/messages")).into_response());
    }

    let identity = exchange_code(&state, &code).await?;

    let ip = client_ip_from_headers(&headers, connect_info.map(|c| c.0));
    state.store.upsert_login(
        &identity.id,
        &identity.username,
        identity.avatar_url.as_deref(),
        ip.map(|ip| ip.to_string()).as_deref(),
    )?;

    if state.store.is_blocked(&identity.id)? {
        info!(user = %identity.id, "blocked user attempted login");
        return Ok(Redirect::to(&format!("{origin}/?error=blocked")).into_response());
    }

    info!(user = %identity.id, name = %identity.username, "user logged in");
    let token = state.sessions.create(identity).await;

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&token))]),
        Redirect::to(&format!("{origin}/messages")),
    )
        .into_response())
}

/// Run the code-for-token exchange and fetch the caller's profile.
async fn exchange_code(state: &AppState, code: &str) -> Result<Identity, ServerError> {
    let (client_id, client_secret) = state
        .config
        .oauth_credentials()
        .ok_or(ServerError::NotConfigured("Discord OAuth"))?;

    let token: TokenResponse = state
        .http
        .post(DISCORD_TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", state.config.discord_redirect_uri.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let user: DiscordUser = state
        .http
        .get(format!("{DISCORD_API_BASE}/users/@me"))
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(user.into_identity())
}

/// `GET /auth/user` -- the session's identity, or null. Never rejects.
pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let identity = match session_token(&headers) {
        Some(token) => state.sessions.get(&token).await,
        None => None,
    };
    Json(serde_json::json!({ "user": identity }))
}

/// `POST /auth/logout` -- destroy the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.destroy(&token).await;
    }
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discord_user_maps_to_identity() {
        let user = DiscordUser {
            id: "80351110224678912".to_string(),
            username: "nelly".to_string(),
            global_name: Some("Nelly".to_string()),
            avatar: Some("8342729096ea3675442027381ff50dfe".to_string()),
        };
        let identity = user.into_identity();
        assert_eq!(identity.username, "nelly");
        assert!(identity
            .avatar_url
            .as_deref()
            .unwrap()
            .contains("/avatars/80351110224678912/"));
    }

    #[test]
    fn empty_username_falls_back_to_global_name() {
        let user = DiscordUser {
            id: "1".to_string(),
            username: String::new(),
            global_name: Some("Display".to_string()),
            avatar: None,
        };
        let identity = user.into_identity();
        assert_eq!(identity.username, "Display");
        assert_eq!(identity.avatar_url, None);
    }
}
