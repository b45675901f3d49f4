//! Player search endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::identity::resolve_identities;
use crate::models::CanonicalIdentity;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Free-text query: a name prefix or `Name#1234`.
    #[serde(default)]
    pub q: String,
}

/// Search request body.
#[derive(Debug, Default, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    pub query: String,
}

/// GET /api/search - Resolve a query string into player identities.
pub async fn search_players_get(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<CanonicalIdentity>> {
    let results = resolve_identities(&state.upstream, &params.q).await?;
    success(results)
}

/// POST /api/search - Same as GET, with the query in a JSON body.
///
/// An unreadable body counts as an empty query.
pub async fn search_players_post(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Vec<CanonicalIdentity>> {
    let body: SearchBody = serde_json::from_slice(&body).unwrap_or_default();
    let results = resolve_identities(&state.upstream, &body.query).await?;
    success(results)
}
