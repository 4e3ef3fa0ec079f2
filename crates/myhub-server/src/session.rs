//! Server-side session storage and cookie plumbing.
//!
//! Sessions are opaque 64-character random tokens mapped to the resolved
//! [`Identity`] in memory, with a 24-hour lifetime and a periodic sweep.
//! The browser only ever holds the token, so there is nothing to sign.
//! OAuth login `state` parameters live in a second, short-lived set with
//! the same shape.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::RwLock;
use tracing::debug;

use myhub_shared::constants::{OAUTH_STATE_TTL_SECS, SESSION_COOKIE, SESSION_TTL_SECS};
use myhub_shared::Identity;

const TOKEN_LEN: usize = 64;

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Session {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

/// In-memory session map: token -> identity, with TTL.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for the identity and return its token.
    pub async fn create(&self, identity: Identity) -> String {
        let token = random_token();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            token.clone(),
            Session {
                identity,
                expires_at: Utc::now() + Duration::seconds(SESSION_TTL_SECS),
            },
        );
        token
    }

    /// Resolve a token to its identity, ignoring expired entries.
    pub async fn get(&self, token: &str) -> Option<Identity> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.identity.clone())
    }

    /// Drop a session (logout, or lazily on a block).
    pub async fn destroy(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
    }

    /// Evict expired sessions.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
    }
}

// ---------------------------------------------------------------------------
// OAuth pending states
// ---------------------------------------------------------------------------

/// Outstanding OAuth `state` parameters awaiting their callback.
#[derive(Clone, Default)]
pub struct OauthStates {
    states: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl OauthStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a state token for a login redirect.
    pub async fn issue(&self) -> String {
        let token = random_token();
        let mut states = self.states.write().await;
        states.insert(
            token.clone(),
            Utc::now() + Duration::seconds(OAUTH_STATE_TTL_SECS),
        );
        token
    }

    /// Consume a state returned by the provider. Each state is single-use.
    pub async fn consume(&self, token: &str) -> bool {
        let mut states = self.states.write().await;
        match states.remove(token) {
            Some(expires_at) => expires_at > Utc::now(),
            None => false,
        }
    }

    /// Evict states whose login was never completed.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut states = self.states.write().await;
        states.retain(|_, expires_at| *expires_at > now);
    }
}

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

/// Pull the session token out of the `Cookie` request header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(SESSION_COOKIE) {
            let value = parts.next()?.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// `Set-Cookie` value installing the session token.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_TTL_SECS}"
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use myhub_shared::UserId;

    fn identity(id: &str) -> Identity {
        Identity {
            id: UserId::from(id),
            username: "tester".to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn create_get_destroy_round_trip() {
        let store = SessionStore::new();
        let token = store.create(identity("1")).await;

        let resolved = store.get(&token).await.unwrap();
        assert_eq!(resolved.id, UserId::from("1"));

        store.destroy(&token).await;
        assert!(store.get(&token).await.is_none());
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let store = SessionStore::new();
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let states = OauthStates::new();
        let token = states.issue().await;

        assert!(states.consume(&token).await);
        assert!(!states.consume(&token).await);
        assert!(!states.consume("forged").await);
    }

    #[test]
    fn cookie_header_round_trip() {
        let set = session_cookie("abc123");
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "other=1; myhub_session=abc123; theme=dark".parse().unwrap(),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert!(set.contains("HttpOnly"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert_ne!(a, b);
    }
}
