use serde::{Deserialize, Serialize};

// User identity = Discord snowflake (decimal string)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The authenticated caller's external profile, resolved once per request
/// by the identity gate and passed explicitly to handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// CDN URL for a Discord avatar hash, or `None` when the profile has
    /// no custom avatar.
    pub fn avatar_url_for(id: &UserId, avatar_hash: Option<&str>) -> Option<String> {
        avatar_hash.map(|hash| {
            format!(
                "{}/avatars/{}/{}.png",
                crate::constants::DISCORD_CDN_BASE,
                id,
                hash
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_url_none_without_hash() {
        let id = UserId::from("80351110224678912");
        assert_eq!(Identity::avatar_url_for(&id, None), None);
    }

    #[test]
    fn avatar_url_points_at_cdn() {
        let id = UserId::from("80351110224678912");
        let url = Identity::avatar_url_for(&id, Some("8342729096ea3675442027381ff50dfe")).unwrap();
        assert_eq!(
            url,
            "https://cdn.discordapp.com/avatars/80351110224678912/8342729096ea3675442027381ff50dfe.png"
        );
    }

    #[test]
    fn identity_serializes_camel_case() {
        let identity = Identity {
            id: UserId::from("1"),
            username: "blake".to_string(),
            avatar_url: None,
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("avatarUrl").is_some());
    }
}
