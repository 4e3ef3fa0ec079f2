//! Stateless read-through proxies for the dashboard's third-party data
//! sources: Lanyard presence, the official Discord profile API, Last.fm
//! scrobbles, and WakaTime coding stats.
//!
//! None of these require a session. A missing credential disables only its
//! own endpoint; upstream failures surface as 502 and are never retried --
//! the dashboard re-polls on its own timers.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use myhub_shared::constants::{DISCORD_API_BASE, DISCORD_CDN_BASE};
use myhub_shared::{decode_badges, ProfileFeatures};

use crate::api::AppState;
use crate::error::ServerError;

const LANYARD_API_BASE: &str = "https://api.lanyard.rest/v1";
const LASTFM_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";
const WAKATIME_API_BASE: &str = "https://wakatime.com/api/v1";

// ---------------------------------------------------------------------------
// Lanyard
// ---------------------------------------------------------------------------

/// `GET /api/lanyard/:userId` -- live Discord presence, passed through.
pub async fn lanyard(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let data: Value = state
        .http
        .get(format!("{LANYARD_API_BASE}/users/{user_id}"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(Json(data))
}

// ---------------------------------------------------------------------------
// Discord profile
// ---------------------------------------------------------------------------

fn field_present(user: &Value, key: &str) -> bool {
    user.get(key).map(|v| !v.is_null()).unwrap_or(false)
}

/// `GET /api/discord/profile/:userId` -- profile enriched with the decoded
/// badge list and computed CDN URLs.
pub async fn discord_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let bot_token = state
        .config
        .discord_bot_token
        .as_ref()
        .ok_or(ServerError::NotConfigured("Discord bot token"))?;

    let user: Value = state
        .http
        .get(format!("{DISCORD_API_BASE}/users/{user_id}"))
        .header("authorization", format!("Bot {bot_token}"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let public_flags = user
        .get("public_flags")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let features = ProfileFeatures {
        animated_banner: user
            .get("banner")
            .and_then(Value::as_str)
            .map(|b| b.starts_with("a_"))
            .unwrap_or(false),
        avatar_decoration: field_present(&user, "avatar_decoration_data"),
        display_name_styles: field_present(&user, "display_name_styles"),
        collectibles: field_present(&user, "collectibles"),
    };

    let badges = decode_badges(public_flags, &features);

    let id = user
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(user_id.as_str());

    let avatar_url = match user.get("avatar").and_then(Value::as_str) {
        Some(hash) => format!("{DISCORD_CDN_BASE}/avatars/{id}/{hash}.png?size=256"),
        None => {
            let discriminator = user
                .get("discriminator")
                .and_then(Value::as_str)
                .and_then(|d| d.parse::<u32>().ok())
                .unwrap_or(0);
            format!("{DISCORD_CDN_BASE}/embed/avatars/{}.png", discriminator % 5)
        }
    };

    let banner_url = user
        .get("banner")
        .and_then(Value::as_str)
        .map(|hash| format!("{DISCORD_CDN_BASE}/banners/{id}/{hash}.png?size=600"));

    let clan = user.get("clan").cloned().unwrap_or(Value::Null);
    let avatar_decoration = user
        .get("avatar_decoration_data")
        .cloned()
        .unwrap_or(Value::Null);
    let nameplate = user
        .pointer("/collectibles/nameplate")
        .cloned()
        .unwrap_or(Value::Null);

    Ok(Json(serde_json::json!({
        "user": user,
        "badges": badges,
        "clan": clan,
        "avatar_decoration": avatar_decoration,
        "nameplate": nameplate,
        "avatar_url": avatar_url,
        "banner_url": banner_url,
    })))
}

// ---------------------------------------------------------------------------
// Last.fm
// ---------------------------------------------------------------------------

/// `GET /api/lastfm/recent` -- the most recent scrobble, passed through.
pub async fn lastfm_recent(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    let (Some(username), Some(api_key)) = (
        state.config.lastfm_username.as_ref(),
        state.config.lastfm_api_key.as_ref(),
    ) else {
        return Err(ServerError::NotConfigured("Last.fm credentials"));
    };

    let data: Value = state
        .http
        .get(LASTFM_API_URL)
        .query(&[
            ("method", "user.getrecenttracks"),
            ("user", username.as_str()),
            ("api_key", api_key.as_str()),
            ("format", "json"),
            ("limit", "1"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(Json(data))
}

// ---------------------------------------------------------------------------
// WakaTime
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SummariesResponse {
    #[serde(default)]
    data: Vec<DaySummary>,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    grand_total: Option<GrandTotal>,
    range: DayRange,
    #[serde(default)]
    languages: Vec<LanguageSummary>,
}

#[derive(Debug, Deserialize)]
struct GrandTotal {
    #[serde(default)]
    total_seconds: f64,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DayRange {
    date: String,
}

#[derive(Debug, Deserialize)]
struct LanguageSummary {
    name: String,
    #[serde(default)]
    total_seconds: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LanguageStat {
    name: String,
    total_seconds: f64,
    percent: f64,
    text: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BestDay {
    date: String,
    text: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct WakaTimeStats {
    status: &'static str,
    human_readable_total: String,
    total_seconds: f64,
    languages: Vec<LanguageStat>,
    best_day: Option<BestDay>,
    is_coding_activity_visible: bool,
    is_language_usage_visible: bool,
    is_editor_usage_visible: bool,
}

/// `GET /api/wakatime/stats` -- the last 7 days of summaries folded into
/// one stats object: total time, per-language share, and the best day.
pub async fn wakatime_stats(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    let (Some(username), Some(api_key)) = (
        state.config.wakatime_username.as_ref(),
        state.config.wakatime_api_key.as_ref(),
    ) else {
        return Err(ServerError::NotConfigured("WakaTime credentials"));
    };

    let end = Utc::now().date_naive();
    let start = end - Duration::days(6);

    let response: SummariesResponse = state
        .http
        .get(format!("{WAKATIME_API_BASE}/users/{username}/summaries"))
        .query(&[
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
            ("api_key", api_key.clone()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let stats = aggregate_summaries(response.data);
    Ok(Json(serde_json::json!({ "data": stats })))
}

/// Fold daily summaries into cumulative stats. Language order follows
/// descending total time; percentages are rounded to two decimals.
fn aggregate_summaries(days: Vec<DaySummary>) -> WakaTimeStats {
    let mut total_seconds = 0.0f64;
    let mut best_day: Option<BestDay> = None;
    let mut best_day_seconds = 0.0f64;
    // First-seen order keeps ties stable under the sort below.
    let mut languages: Vec<(String, f64)> = Vec::new();

    for day in days {
        let day_total = day
            .grand_total
            .as_ref()
            .map(|g| g.total_seconds)
            .unwrap_or(0.0);
        total_seconds += day_total;

        if day_total > best_day_seconds {
            best_day_seconds = day_total;
            best_day = Some(BestDay {
                date: day.range.date.clone(),
                text: day
                    .grand_total
                    .as_ref()
                    .and_then(|g| g.text.clone())
                    .unwrap_or_else(|| "0 secs".to_string()),
            });
        }

        for lang in day.languages {
            match languages.iter_mut().find(|(name, _)| *name == lang.name) {
                Some((_, seconds)) => *seconds += lang.total_seconds,
                None => languages.push((lang.name, lang.total_seconds)),
            }
        }
    }

    languages.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let language_stats = languages
        .into_iter()
        .map(|(name, seconds)| {
            let percent = if total_seconds > 0.0 {
                ((seconds / total_seconds * 100.0) * 100.0).round() / 100.0
            } else {
                0.0
            };
            LanguageStat {
                name,
                total_seconds: seconds,
                percent,
                text: format_duration(seconds),
            }
        })
        .collect();

    let hours = (total_seconds / 3600.0).floor() as u64;
    let mins = ((total_seconds % 3600.0) / 60.0).floor() as u64;
    let human_readable_total = if hours > 0 {
        format!("{hours} hrs {mins} mins")
    } else {
        format!("{mins} mins")
    };

    WakaTimeStats {
        status: "ok",
        human_readable_total,
        total_seconds,
        languages: language_stats,
        best_day,
        is_coding_activity_visible: true,
        is_language_usage_visible: true,
        is_editor_usage_visible: true,
    }
}

fn format_duration(seconds: f64) -> String {
    let hours = (seconds / 3600.0).floor() as u64;
    let mins = ((seconds % 3600.0) / 60.0).floor() as u64;
    if hours > 0 {
        format!("{hours} hrs {mins} mins")
    } else if mins > 0 {
        format!("{mins} mins")
    } else {
        format!("{} secs", seconds.floor() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, total: f64, langs: &[(&str, f64)]) -> DaySummary {
        DaySummary {
            grand_total: Some(GrandTotal {
                total_seconds: total,
                text: Some(format_duration(total)),
            }),
            range: DayRange {
                date: date.to_string(),
            },
            languages: langs
                .iter()
                .map(|(name, seconds)| LanguageSummary {
                    name: name.to_string(),
                    total_seconds: *seconds,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_week_aggregates_to_zero() {
        let stats = aggregate_summaries(vec![]);
        assert_eq!(stats.total_seconds, 0.0);
        assert_eq!(stats.human_readable_total, "0 mins");
        assert!(stats.best_day.is_none());
        assert!(stats.languages.is_empty());
    }

    #[test]
    fn totals_and_best_day() {
        let stats = aggregate_summaries(vec![
            day("2026-08-01", 3600.0, &[("Rust", 3600.0)]),
            day("2026-08-02", 7200.0, &[("Rust", 5400.0), ("TOML", 1800.0)]),
        ]);

        assert_eq!(stats.total_seconds, 10800.0);
        assert_eq!(stats.human_readable_total, "3 hrs 0 mins");
        assert_eq!(stats.best_day.as_ref().unwrap().date, "2026-08-02");
    }

    #[test]
    fn languages_merge_across_days_and_sort_desc() {
        let stats = aggregate_summaries(vec![
            day("2026-08-01", 1800.0, &[("TOML", 1800.0)]),
            day("2026-08-02", 9000.0, &[("Rust", 9000.0)]),
        ]);

        assert_eq!(stats.languages[0].name, "Rust");
        assert_eq!(stats.languages[1].name, "TOML");
        // 1800 of 10800 = 16.666...% -> rounded to 2 decimals.
        assert_eq!(stats.languages[1].percent, 16.67);
        assert_eq!(stats.languages[0].text, "2 hrs 30 mins");
    }

    #[test]
    fn zero_activity_day_never_wins_best_day() {
        let stats = aggregate_summaries(vec![day("2026-08-01", 0.0, &[])]);
        assert!(stats.best_day.is_none());
    }

    #[test]
    fn duration_formatting_tiers() {
        assert_eq!(format_duration(45.0), "45 secs");
        assert_eq!(format_duration(120.0), "2 mins");
        assert_eq!(format_duration(3660.0), "1 hrs 1 mins");
    }
}
