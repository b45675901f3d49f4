//! Display badge and badge assignment endpoints.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{list_limit, success, ApiResult};
use crate::auth::current_session;
use crate::errors::AppError;
use crate::models::{
    Badge, BadgeInfo, BadgeKey, CreateBadgeRequest, SetUserBadgesRequest, UserBadgeAssignment,
};
use crate::AppState;

/// Recent badge listing parameters.
#[derive(Debug, Deserialize)]
pub struct RecentBadgesQuery {
    pub limit: Option<i64>,
}

/// Admin lookup parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgesQuery {
    pub membership_id: Option<String>,
}

/// Public view of an account's assigned badges.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgesView {
    pub membership_id: String,
    pub badges: Vec<BadgeInfo>,
}

/// Admin view of an account's assigned badges.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserBadgesView {
    pub membership_id: String,
    pub badges: Vec<BadgeKey>,
    pub allowed: Vec<BadgeKey>,
}

/// Result of replacing an account's badges.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgesUpdated {
    pub membership_id: String,
    #[serde(flatten)]
    pub entry: UserBadgeAssignment,
}

/// GET /api/badges - Newest badges across all players.
pub async fn list_recent_badges(
    State(state): State<AppState>,
    Query(params): Query<RecentBadgesQuery>,
) -> ApiResult<Vec<Badge>> {
    success(state.repo.list_recent_badges(list_limit(params.limit)).await?)
}

/// GET /api/players/{name}/badges - Badges of one player in display order.
pub async fn list_player_badges(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<Badge>> {
    success(state.repo.list_badges_for_player(&name).await?)
}

/// POST /api/admin/badges - Attach a badge to a player name.
pub async fn create_badge(
    State(state): State<AppState>,
    Json(request): Json<CreateBadgeRequest>,
) -> ApiResult<Badge> {
    let badge = state.repo.append_badge(&request).await?;
    tracing::info!(id = badge.id, player = %badge.player_name, "Badge added");
    success(badge)
}

/// GET /api/user-badges/{membershipId} - Assigned badges with display metadata.
pub async fn get_user_badges(
    State(state): State<AppState>,
    Path(membership_id): Path<String>,
) -> ApiResult<UserBadgesView> {
    let mut badges: Vec<BadgeInfo> = state
        .badge_store
        .get_assigned_badges(membership_id.trim())
        .await?
        .iter()
        .map(BadgeKey::info)
        .collect();
    badges.sort_by_key(|b| b.priority);

    success(UserBadgesView {
        membership_id,
        badges,
    })
}

/// GET /api/admin/user-badges - Assigned badge keys plus the allowed set.
pub async fn admin_get_user_badges(
    State(state): State<AppState>,
    Query(params): Query<UserBadgesQuery>,
) -> ApiResult<AdminUserBadgesView> {
    let membership_id = params
        .membership_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("membershipId is required".to_string()))?;

    let badges = state.badge_store.get_assigned_badges(membership_id).await?;

    success(AdminUserBadgesView {
        membership_id: membership_id.to_string(),
        badges,
        allowed: BadgeKey::ALL.to_vec(),
    })
}

/// POST /api/admin/user-badges - Replace an account's badge set.
pub async fn admin_set_user_badges(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SetUserBadgesRequest>,
) -> ApiResult<UserBadgesUpdated> {
    let membership_id = request.membership_id.trim();
    if membership_id.is_empty() {
        return Err(AppError::Validation("membershipId is required".to_string()));
    }

    let updated_by = current_session(&state.repo, &headers)
        .await?
        .map(|session| session.display_name)
        .unwrap_or_else(|| "admin".to_string());

    let entry = state
        .badge_store
        .set_assigned_badges(membership_id, &request.badges, &updated_by)
        .await?;

    success(UserBadgesUpdated {
        membership_id: membership_id.to_string(),
        entry,
    })
}
