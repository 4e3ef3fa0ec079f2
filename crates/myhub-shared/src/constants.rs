/// Application name
pub const APP_NAME: &str = "MyHub";

/// Session cookie name
pub const SESSION_COOKIE: &str = "myhub_session";

/// Session lifetime in seconds (24 hours)
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// OAuth `state` parameter lifetime in seconds
pub const OAUTH_STATE_TTL_SECS: i64 = 10 * 60;

/// General API rate window (15 minutes) and per-IP request budget
pub const API_WINDOW_SECS: u64 = 15 * 60;
pub const API_WINDOW_LIMIT: u32 = 500;

/// Auth route rate window (15 minutes) and per-IP attempt budget
pub const AUTH_WINDOW_SECS: u64 = 15 * 60;
pub const AUTH_WINDOW_LIMIT: u32 = 50;

/// Message-send rate window (1 minute) and per-IP send budget
pub const MESSAGE_WINDOW_SECS: u64 = 60;
pub const MESSAGE_WINDOW_LIMIT: u32 = 10;

/// Discord REST API base URL (v10)
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord OAuth2 endpoints
pub const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
pub const DISCORD_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";

/// Discord CDN base URL (avatars, banners, default embeds)
pub const DISCORD_CDN_BASE: &str = "https://cdn.discordapp.com";

/// Block reason recorded when an admin gives none
pub const DEFAULT_BLOCK_REASON: &str = "No reason provided";
