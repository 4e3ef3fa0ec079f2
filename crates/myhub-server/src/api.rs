//! HTTP surface: application state, router assembly, and the serve loop.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use myhub_shared::constants::{
    API_WINDOW_LIMIT, API_WINDOW_SECS, AUTH_WINDOW_LIMIT, AUTH_WINDOW_SECS,
    MESSAGE_WINDOW_LIMIT, MESSAGE_WINDOW_SECS,
};
use myhub_store::Store;

use crate::admin;
use crate::auth;
use crate::config::{ServerConfig, DEFAULT_FRONTEND_ORIGIN};
use crate::contact::{self, Mailer};
use crate::conversations;
use crate::proxy;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::session::{OauthStates, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: SessionStore,
    pub oauth_states: OauthStates,
    pub http: reqwest::Client,
    pub mailer: Option<Mailer>,
    pub api_limiter: RateLimiter,
    pub auth_limiter: RateLimiter,
    pub message_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire up state from config and an opened store. Rate window sizes
    /// live in `myhub_shared::constants`.
    pub fn new(
        store: Store,
        http: reqwest::Client,
        mailer: Option<Mailer>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            oauth_states: OauthStates::new(),
            http,
            mailer,
            api_limiter: RateLimiter::new(
                API_WINDOW_LIMIT,
                Duration::from_secs(API_WINDOW_SECS),
            ),
            auth_limiter: RateLimiter::new(
                AUTH_WINDOW_LIMIT,
                Duration::from_secs(AUTH_WINDOW_SECS),
            ),
            message_limiter: RateLimiter::new(
                MESSAGE_WINDOW_LIMIT,
                Duration::from_secs(MESSAGE_WINDOW_SECS),
            ),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let origin = state
        .config
        .frontend_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_FRONTEND_ORIGIN));

    // Credentials (the session cookie) require a concrete origin.
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/discord", get(auth::discord_login))
        .route("/callback", get(auth::discord_callback))
        .route("/user", get(auth::current_user))
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn_with_state(
            state.auth_limiter.clone(),
            rate_limit_middleware,
        ));

    let api_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/:id",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route(
            "/conversations/:id/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .route(
            "/conversations/:id/close",
            patch(conversations::close_conversation),
        )
        .route(
            "/conversations/:id/reopen",
            patch(conversations::reopen_conversation),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/users/:id/block", post(admin::block_user))
        .route("/admin/users/:id/unblock", post(admin::unblock_user))
        .route("/discord/profile/:id", get(proxy::discord_profile))
        .route("/lanyard/:id", get(proxy::lanyard))
        .route("/lastfm/recent", get(proxy::lastfm_recent))
        .route("/wakatime/stats", get(proxy::wakatime_stats))
        .route("/contact/email", post(contact::contact_email))
        .route("/contact/discord", post(contact::contact_discord))
        .layer(middleware::from_fn_with_state(
            state.api_limiter.clone(),
            rate_limit_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/api", api_routes);

    // Serve the pre-built SPA bundle, falling back to index.html for
    // client-side routes.
    if let Some(dir) = &state.config.static_dir {
        let spa = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

async fn health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
