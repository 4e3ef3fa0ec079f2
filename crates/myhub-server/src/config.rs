//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. Optional third-party credentials
//! disable only their dependent endpoint when absent.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use myhub_shared::UserId;

/// Fallback frontend origin for CORS and post-login redirects.
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:1500";

/// Outbound SMTP settings for the contact-form mailer.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Env: `SMTP_HOST`
    pub host: String,
    /// Env: `SMTP_PORT` (default 587, STARTTLS)
    pub port: u16,
    /// Env: `SMTP_USER` -- also the notification recipient address.
    pub user: String,
    /// Env: `SMTP_PASS`
    pub pass: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:1600`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: `./myhub.db`
    pub database_path: PathBuf,

    /// Maximum pooled database connections.
    /// Env: `DATABASE_POOL_SIZE`
    /// Default: `20`
    pub pool_size: u32,

    /// Timeout when acquiring a pooled connection.
    /// Env: `DATABASE_ACQUIRE_TIMEOUT_MS`
    /// Default: `2000`
    pub pool_acquire_timeout: Duration,

    /// Browser origin of the SPA, used for CORS and OAuth redirects.
    /// Env: `FRONTEND_ORIGIN`
    /// Default: `http://localhost:1500`
    pub frontend_origin: String,

    /// Directory of pre-built SPA assets to serve, if any.
    /// Env: `STATIC_DIR`
    pub static_dir: Option<PathBuf>,

    /// Discord OAuth application credentials.
    /// Env: `DISCORD_CLIENT_ID` / `DISCORD_CLIENT_SECRET`
    /// Absent: the login endpoints answer "not configured".
    pub discord_client_id: Option<String>,
    pub discord_client_secret: Option<String>,

    /// OAuth callback URL registered with Discord.
    /// Env: `DISCORD_REDIRECT_URI`
    /// Default: `http://localhost:1500/auth/callback`
    pub discord_redirect_uri: String,

    /// Discord snowflake of the single admin identity.
    /// Env: `ADMIN_DISCORD_ID`
    /// Absent: nobody is admin.
    pub admin_discord_id: Option<String>,

    /// Bot token for the Discord profile proxy.
    /// Env: `DISCORD_BOT_TOKEN`
    pub discord_bot_token: Option<String>,

    /// Last.fm credentials for the now-playing proxy.
    /// Env: `LASTFM_USERNAME` / `LASTFM_API_KEY`
    pub lastfm_username: Option<String>,
    pub lastfm_api_key: Option<String>,

    /// WakaTime credentials for the coding-stats proxy.
    /// Env: `WAKATIME_USERNAME` / `WAKATIME_API_KEY`
    pub wakatime_username: Option<String>,
    pub wakatime_api_key: Option<String>,

    /// SMTP settings; present only when host, user, and pass are all set.
    pub smtp: Option<SmtpConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 1600).into(),
            database_path: PathBuf::from("./myhub.db"),
            pool_size: 20,
            pool_acquire_timeout: Duration::from_millis(2000),
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
            static_dir: None,
            discord_client_id: None,
            discord_client_secret: None,
            discord_redirect_uri: "http://localhost:1500/auth/callback".to_string(),
            admin_discord_id: None,
            discord_bot_token: None,
            lastfm_username: None,
            lastfm_api_key: None,
            wakatime_username: None,
            wakatime_api_key: None,
            smtp: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("DATABASE_POOL_SIZE") {
            if let Ok(n) = val.parse::<u32>() {
                config.pool_size = n.max(1);
            }
        }

        if let Ok(val) = std::env::var("DATABASE_ACQUIRE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.pool_acquire_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(origin) = std::env::var("FRONTEND_ORIGIN") {
            config.frontend_origin = origin.trim_end_matches('/').to_string();
        }

        if let Ok(dir) = std::env::var("STATIC_DIR") {
            if !dir.is_empty() {
                config.static_dir = Some(PathBuf::from(dir));
            }
        }

        config.discord_client_id = non_empty_var("DISCORD_CLIENT_ID");
        config.discord_client_secret = non_empty_var("DISCORD_CLIENT_SECRET");

        if let Ok(uri) = std::env::var("DISCORD_REDIRECT_URI") {
            config.discord_redirect_uri = uri;
        }

        config.admin_discord_id = non_empty_var("ADMIN_DISCORD_ID");
        config.discord_bot_token = non_empty_var("DISCORD_BOT_TOKEN");
        config.lastfm_username = non_empty_var("LASTFM_USERNAME");
        config.lastfm_api_key = non_empty_var("LASTFM_API_KEY");
        config.wakatime_username = non_empty_var("WAKATIME_USERNAME");
        config.wakatime_api_key = non_empty_var("WAKATIME_API_KEY");

        let smtp_port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        if let (Some(host), Some(user), Some(pass)) = (
            non_empty_var("SMTP_HOST"),
            non_empty_var("SMTP_USER"),
            non_empty_var("SMTP_PASS"),
        ) {
            config.smtp = Some(SmtpConfig {
                host,
                port: smtp_port,
                user,
                pass,
            });
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Whether the given identity is the configured admin.
    pub fn is_admin(&self, id: &UserId) -> bool {
        self.admin_discord_id.as_deref() == Some(id.as_str())
    }

    /// OAuth credentials pair, when login is configured.
    pub fn oauth_credentials(&self) -> Option<(&str, &str)> {
        match (&self.discord_client_id, &self.discord_client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

/// Read an env var, treating empty values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 1600).into());
        assert_eq!(config.pool_size, 20);
        assert!(config.smtp.is_none());
        assert!(config.oauth_credentials().is_none());
    }

    #[test]
    fn nobody_is_admin_by_default() {
        let config = ServerConfig::default();
        assert!(!config.is_admin(&UserId::from("123")));
    }

    #[test]
    fn admin_id_comparison_is_exact() {
        let config = ServerConfig {
            admin_discord_id: Some("123".to_string()),
            ..Default::default()
        };
        assert!(config.is_admin(&UserId::from("123")));
        assert!(!config.is_admin(&UserId::from("1234")));
    }
}
