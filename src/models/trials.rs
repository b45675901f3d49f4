//! Trials rotation metadata.

use serde::{Deserialize, Serialize};

/// One entry of the append-only trials log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialsMeta {
    pub id: i64,
    pub active: bool,
    pub map_name: Option<String>,
    pub map_hash: Option<i64>,
    pub map_image_url: Option<String>,
    pub updated_at: String,
}

/// Request body for appending trials state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendTrialsRequest {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default)]
    pub map_hash: Option<i64>,
    #[serde(default)]
    pub map_image_url: Option<String>,
}

/// A PvP map from the provider's activity catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvpMap {
    pub hash: i64,
    pub name: String,
    pub icon: Option<String>,
}

/// A map resolved for storage in the trials log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMap {
    pub map_name: String,
    pub map_hash: i64,
    pub map_image_url: Option<String>,
}
