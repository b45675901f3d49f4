//! Site settings endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::models::{SiteSetting, UpdateSettingsRequest};
use crate::AppState;

/// GET /api/settings - All site settings.
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Vec<SiteSetting>> {
    success(state.repo.list_settings().await?)
}

/// Value of one setting; `null` when unset.
#[derive(Debug, Serialize)]
pub struct SettingValue {
    pub key: String,
    pub value: Option<String>,
}

/// GET /api/settings/{key} - One setting by key.
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<SettingValue> {
    let value = state.repo.get_setting(&key).await?;
    success(SettingValue { key, value })
}

/// POST /api/admin/settings - Overwrite the settings present in the form.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Vec<SiteSetting>> {
    let mut written = Vec::new();
    for (key, value) in request.entries() {
        written.push(state.repo.set_setting(key, Some(&value)).await?);
    }
    success(written)
}
