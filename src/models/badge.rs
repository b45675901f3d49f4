//! Public display badges attached to player names.

use serde::{Deserialize, Serialize};

/// A badge row. Badges are never edited; a new badge is a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: i64,
    pub player_name: String,
    pub badge_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_class: Option<String>,
    pub created_at: String,
}

/// Request body for creating a badge.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBadgeRequest {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub badge_text: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub badge_class: Option<String>,
}

/// Display priority of a badge class; lower sorts first.
pub fn badge_class_priority(badge_class: Option<&str>) -> i32 {
    match badge_class {
        Some("dev") => 1,
        Some("advisor") => 2,
        Some("partner") => 3,
        _ => 99,
    }
}
