//! Site-wide key/value settings.

use serde::{Deserialize, Serialize};

/// Known setting keys written by the admin settings form.
pub const APP_VERSION: &str = "app_version";
pub const APP_STATUS: &str = "app_status";
pub const DISCORD_INVITE: &str = "discord_invite";

/// A stored setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSetting {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: String,
}

/// Request body for the admin settings form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub app_status: Option<String>,
    #[serde(default)]
    pub discord_invite: Option<String>,
}

impl UpdateSettingsRequest {
    /// The non-empty fields as `(key, value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        [
            (APP_VERSION, &self.app_version),
            (APP_STATUS, &self.app_status),
            (DISCORD_INVITE, &self.discord_invite),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_skip_blank_fields() {
        let request = UpdateSettingsRequest {
            app_version: Some(" 1.4.0 ".to_string()),
            app_status: Some("   ".to_string()),
            discord_invite: None,
        };

        assert_eq!(request.entries(), vec![(APP_VERSION, "1.4.0".to_string())]);
    }
}
