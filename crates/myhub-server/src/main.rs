//! # myhub-server
//!
//! Backend for the MyHub personal dashboard.
//!
//! This binary provides:
//! - **Discord OAuth login** with server-side sessions and a block list
//! - **Support conversations** (one per user, admin sees all) over SQLite
//! - **Admin moderation API** for blocking, unblocking, and deleting users
//! - **Read-through proxies** for Lanyard, Discord profiles, Last.fm, and
//!   WakaTime widgets
//! - **Contact-form mail delivery** over SMTP
//! - **Per-IP rate limiting** with independent windows per route class

mod admin;
mod api;
mod auth;
mod config;
mod contact;
mod conversations;
mod error;
mod proxy;
mod rate_limit;
mod session;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use myhub_store::Store;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::contact::Mailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,myhub_server=debug")),
        )
        .init();

    info!("Starting MyHub backend v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        frontend = %config.frontend_origin,
        oauth_enabled = config.oauth_credentials().is_some(),
        admin_configured = config.admin_discord_id.is_some(),
        discord_proxy = config.discord_bot_token.is_some(),
        lastfm_proxy = config.lastfm_api_key.is_some(),
        wakatime_proxy = config.wakatime_api_key.is_some(),
        smtp = config.smtp.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Database (pool + migrations). Failure here is fatal to boot.
    let store = Store::open_with(
        &config.database_path,
        config.pool_size,
        config.pool_acquire_timeout,
    )?;

    // Shared outbound HTTP client for OAuth and the proxies.
    let http = reqwest::Client::builder()
        .user_agent(concat!("MyHub-Dashboard/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()?;

    // SMTP transport; a bad mail config only disables the contact routes.
    let mailer = match &config.smtp {
        Some(smtp) => match Mailer::from_config(smtp) {
            Ok(mailer) => Some(mailer),
            Err(e) => {
                warn!(error = %e, "SMTP configuration rejected, contact form disabled");
                None
            }
        },
        None => None,
    };

    let state = AppState::new(store, http, mailer, Arc::new(config.clone()));

    // -----------------------------------------------------------------------
    // 4. Spawn background sweeps
    // -----------------------------------------------------------------------

    // Idle rate-limit windows (every 5 minutes).
    for limiter in [
        state.api_limiter.clone(),
        state.auth_limiter.clone(),
        state.message_limiter.clone(),
    ] {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.purge_stale().await;
            }
        });
    }

    // Expired sessions and abandoned OAuth states (every 10 minutes).
    let sessions = state.sessions.clone();
    let oauth_states = state.oauth_states.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
            oauth_states.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
