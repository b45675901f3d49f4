//! Trials rotation and PvP map endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::{list_limit, success, ApiResult};
use crate::models::{AppendTrialsRequest, PvpMap, TrialsMeta};
use crate::AppState;

/// History listing parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Map search parameters.
#[derive(Debug, Deserialize)]
pub struct MapsQuery {
    pub q: Option<String>,
}

/// GET /api/trials - Current trials state, or null before the first entry.
pub async fn get_current_trials(State(state): State<AppState>) -> ApiResult<Option<TrialsMeta>> {
    success(state.repo.get_current_trials_meta().await?)
}

/// GET /api/trials/history - Past trials states, newest first.
pub async fn list_trials_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<Vec<TrialsMeta>> {
    success(state.repo.list_trials_history(list_limit(params.limit)).await?)
}

/// POST /api/admin/trials - Record a new trials state.
///
/// A bare map name is looked up in the PvP map catalog for its hash and image.
pub async fn append_trials(
    State(state): State<AppState>,
    Json(request): Json<AppendTrialsRequest>,
) -> ApiResult<TrialsMeta> {
    let map_name = request
        .map_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let entry = match map_name {
        Some(name) if request.map_hash.is_none() && request.map_image_url.is_none() => {
            let map = state.maps.find_by_name(&state.upstream, name).await?;
            state
                .repo
                .append_trials_meta(
                    request.active,
                    Some(&map.map_name),
                    Some(map.map_hash),
                    map.map_image_url.as_deref(),
                )
                .await?
        }
        _ => {
            state
                .repo
                .append_trials_meta(
                    request.active,
                    map_name,
                    request.map_hash,
                    request.map_image_url.as_deref(),
                )
                .await?
        }
    };

    tracing::info!(
        id = entry.id,
        active = entry.active,
        map = ?entry.map_name,
        "Trials state recorded"
    );
    success(entry)
}

/// GET /api/maps - PvP maps, filtered by `q` when given.
pub async fn list_maps(
    State(state): State<AppState>,
    Query(params): Query<MapsQuery>,
) -> ApiResult<Vec<PvpMap>> {
    let maps = match params.q.as_deref() {
        Some(q) => state.maps.search(&state.upstream, q).await?,
        None => state.maps.list(&state.upstream).await?,
    };
    success(maps)
}
