//! Player profile views assembled from provider data.

use serde::{Deserialize, Serialize};

/// Asset URLs resolved for one emblem hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmblemResolution {
    pub source_hash: Option<i64>,
    pub icon_url: Option<String>,
    pub background_url: Option<String>,
}

/// Clan membership summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClanInfo {
    pub name: String,
    pub tag: Option<String>,
}

/// Competitive playlist progression.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompProgress {
    pub points: i64,
    pub progress_to_next_level: i64,
    pub next_level_at: i64,
}

/// Emblem art shown on a profile card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmblemView {
    pub icon: Option<String>,
    pub background: String,
}

/// Full profile response.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub profile: serde_json::Value,
    pub clan: Option<ClanInfo>,
    pub comp: Option<CompProgress>,
    pub emblem: EmblemView,
}
