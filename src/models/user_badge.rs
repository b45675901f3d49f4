//! Badge keys that admins can assign to accounts.

use serde::{Deserialize, Serialize};

/// Closed set of assignable badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKey {
    Developer,
    Advisor,
    ThirdParty,
    Moderator,
    Verified,
}

/// Display metadata for a badge key.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeInfo {
    pub key: BadgeKey,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub priority: u8,
}

impl BadgeKey {
    pub const ALL: [BadgeKey; 5] = [
        BadgeKey::Developer,
        BadgeKey::Advisor,
        BadgeKey::ThirdParty,
        BadgeKey::Moderator,
        BadgeKey::Verified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeKey::Developer => "developer",
            BadgeKey::Advisor => "advisor",
            BadgeKey::ThirdParty => "third_party",
            BadgeKey::Moderator => "moderator",
            BadgeKey::Verified => "verified",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }

    pub fn info(&self) -> BadgeInfo {
        let (label, color, icon, priority) = match self {
            BadgeKey::Developer => ("Developer", "#ff4d4f", "code", 1),
            BadgeKey::Advisor => ("Advisor", "#4aa3ff", "lightbulb", 2),
            BadgeKey::ThirdParty => ("3rd Party", "#8b5cf6", "link", 3),
            BadgeKey::Moderator => ("Moderator", "#22c55e", "shield", 4),
            BadgeKey::Verified => ("Verified", "#facc15", "check-circle", 5),
        };
        BadgeInfo {
            key: *self,
            label,
            color,
            icon,
            priority,
        }
    }
}

/// The stored badge set of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgeAssignment {
    pub badges: Vec<BadgeKey>,
    pub updated_at: String,
    pub updated_by: String,
}

/// Request body for replacing an account's badges.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUserBadgesRequest {
    #[serde(default)]
    pub membership_id: String,
    /// Left untyped: unknown entries are dropped, not rejected
    #[serde(default)]
    pub badges: serde_json::Value,
}
