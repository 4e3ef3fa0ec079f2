//! Discord profile badge decoding.
//!
//! Discord exposes most badges as bits in the `public_flags` integer; a few
//! (Nitro tier, server boosting) are only inferable from the *presence* of
//! optional profile fields. This module turns both into the ordered badge
//! list the profile widget renders, with no HTTP involved.

use serde::Serializer;

/// A renderable profile badge. `as_str` yields the asset key the frontend
/// uses to pick the badge icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Badge {
    Staff,
    Partner,
    Hypesquad,
    BugHunterLevel1,
    HypesquadBravery,
    HypesquadBrilliance,
    HypesquadBalance,
    PremiumEarlySupporter,
    BugHunterLevel2,
    VerifiedDeveloper,
    CertifiedModerator,
    ActiveDeveloper,
    NitroGold,
    PremiumGuildSubscriber,
    QuestCompleted,
    Apprentice,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Staff => "staff",
            Badge::Partner => "partner",
            Badge::Hypesquad => "hypesquad",
            Badge::BugHunterLevel1 => "bug_hunter_level_1",
            Badge::HypesquadBravery => "hypesquad_online_house_1",
            Badge::HypesquadBrilliance => "hypesquad_online_house_2",
            Badge::HypesquadBalance => "hypesquad_online_house_3",
            Badge::PremiumEarlySupporter => "premium_early_supporter",
            Badge::BugHunterLevel2 => "bug_hunter_level_2",
            Badge::VerifiedDeveloper => "verified_developer",
            Badge::CertifiedModerator => "certified_moderator",
            Badge::ActiveDeveloper => "active_developer",
            Badge::NitroGold => "nitro_gold",
            Badge::PremiumGuildSubscriber => "premium_guild_subscriber",
            Badge::QuestCompleted => "quest_completed",
            Badge::Apprentice => "apprentice",
        }
    }
}

impl serde::Serialize for Badge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `public_flags` bit -> badge, in ascending bit order.
const FLAG_BADGES: &[(u64, Badge)] = &[
    (1, Badge::Staff),
    (1 << 1, Badge::Partner),
    (1 << 2, Badge::Hypesquad),
    (1 << 3, Badge::BugHunterLevel1),
    (1 << 6, Badge::HypesquadBravery),
    (1 << 7, Badge::HypesquadBrilliance),
    (1 << 8, Badge::HypesquadBalance),
    (1 << 9, Badge::PremiumEarlySupporter),
    (1 << 14, Badge::BugHunterLevel2),
    (1 << 17, Badge::VerifiedDeveloper),
    (1 << 18, Badge::CertifiedModerator),
    (1 << 22, Badge::ActiveDeveloper),
];

const HYPESQUAD_BRAVERY_FLAG: u64 = 1 << 6;
const ACTIVE_DEVELOPER_FLAG: u64 = 1 << 22;

/// Optional profile fields whose mere presence implies a badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileFeatures {
    /// Banner hash starts with `a_` (animated)
    pub animated_banner: bool,
    pub avatar_decoration: bool,
    pub display_name_styles: bool,
    pub collectibles: bool,
}

impl ProfileFeatures {
    /// Any feature that requires an active Nitro subscription.
    fn implies_nitro(&self) -> bool {
        self.animated_banner
            || self.avatar_decoration
            || self.display_name_styles
            || self.collectibles
    }

    /// Features only obtainable by boosting a server.
    fn implies_boosting(&self) -> bool {
        self.display_name_styles || self.avatar_decoration
    }
}

/// Decode the badge list in the order Discord renders it (left to right):
/// Nitro tier first, then the pinned bravery/active-developer/booster slots,
/// the fixed quest and apprentice entries, and finally any remaining
/// `public_flags` badges that are not already present.
pub fn decode_badges(public_flags: u64, features: &ProfileFeatures) -> Vec<Badge> {
    let mut badges = Vec::new();

    if features.implies_nitro() {
        badges.push(Badge::NitroGold);
    }

    if public_flags & HYPESQUAD_BRAVERY_FLAG != 0 {
        badges.push(Badge::HypesquadBravery);
    }

    if public_flags & ACTIVE_DEVELOPER_FLAG != 0 {
        badges.push(Badge::ActiveDeveloper);
    }

    if features.implies_boosting() {
        badges.push(Badge::PremiumGuildSubscriber);
    }

    badges.push(Badge::QuestCompleted);
    badges.push(Badge::Apprentice);

    for &(flag, badge) in FLAG_BADGES {
        if public_flags & flag != 0 && !badges.contains(&badge) {
            badges.push(badge);
        }
    }

    badges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_profile_keeps_fixed_badges_only() {
        let badges = decode_badges(0, &ProfileFeatures::default());
        assert_eq!(badges, vec![Badge::QuestCompleted, Badge::Apprentice]);
    }

    #[test]
    fn nitro_inferred_from_any_feature() {
        let features = ProfileFeatures {
            collectibles: true,
            ..Default::default()
        };
        let badges = decode_badges(0, &features);
        assert_eq!(badges[0], Badge::NitroGold);
        // Collectibles alone do not imply boosting.
        assert!(!badges.contains(&Badge::PremiumGuildSubscriber));
    }

    #[test]
    fn booster_inferred_from_decoration() {
        let features = ProfileFeatures {
            avatar_decoration: true,
            ..Default::default()
        };
        let badges = decode_badges(0, &features);
        assert_eq!(
            badges,
            vec![
                Badge::NitroGold,
                Badge::PremiumGuildSubscriber,
                Badge::QuestCompleted,
                Badge::Apprentice,
            ]
        );
    }

    #[test]
    fn pinned_flags_come_before_remaining_flags() {
        // Bravery (64) + active developer (1<<22) + staff (1).
        let flags = 1 | (1 << 6) | (1 << 22);
        let badges = decode_badges(flags, &ProfileFeatures::default());
        assert_eq!(
            badges,
            vec![
                Badge::HypesquadBravery,
                Badge::ActiveDeveloper,
                Badge::QuestCompleted,
                Badge::Apprentice,
                Badge::Staff,
            ]
        );
    }

    #[test]
    fn no_duplicates_between_pinned_and_flag_table() {
        let flags = (1 << 6) | (1 << 22);
        let badges = decode_badges(flags, &ProfileFeatures::default());
        let bravery = badges
            .iter()
            .filter(|b| **b == Badge::HypesquadBravery)
            .count();
        let active = badges
            .iter()
            .filter(|b| **b == Badge::ActiveDeveloper)
            .count();
        assert_eq!((bravery, active), (1, 1));
    }

    #[test]
    fn every_flag_bit_decodes() {
        let all: u64 = FLAG_BADGES.iter().map(|(f, _)| f).sum();
        let badges = decode_badges(all, &ProfileFeatures::default());
        for (_, badge) in FLAG_BADGES {
            assert!(badges.contains(badge), "missing {badge}");
        }
    }

    #[test]
    fn serializes_as_asset_key() {
        let json = serde_json::to_string(&Badge::BugHunterLevel2).unwrap();
        assert_eq!(json, "\"bug_hunter_level_2\"");
    }
}
