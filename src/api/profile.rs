//! Profile, competitive progression and emblem endpoints.

use axum::extract::{Query, State};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use super::{success, ApiResult};
use crate::emblem::parse_emblem_hash;
use crate::errors::AppError;
use crate::models::{ClanInfo, CompProgress, EmblemResolution, EmblemView, ProfileView};
use crate::AppState;

/// Progression hash of the competitive PvP playlist.
pub const COMPETITIVE_PROGRESSION_HASH: &str = "3696598664";

/// Background shown when no emblem art can be found.
pub const MISSING_EMBLEM_BACKGROUND: &str = "/missing_emblem_special.jpg";

/// Components requested for the full profile view.
const PROFILE_COMPONENTS: &str = "100,200,202,900";

/// Account selector shared by the profile routes.
#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    #[serde(rename = "type")]
    pub membership_type: Option<String>,
    pub id: Option<String>,
}

impl AccountQuery {
    /// Validate into `(membership_type, membership_id)`.
    pub fn parse(&self) -> Result<(i32, String), AppError> {
        let membership_type = self
            .membership_type
            .as_deref()
            .map(str::trim)
            .and_then(|t| t.parse::<i32>().ok())
            .ok_or_else(|| AppError::Validation("Query parameter 'type' is required".to_string()))?;

        let membership_id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| AppError::Validation("Query parameter 'id' is required".to_string()))?;

        Ok((membership_type, membership_id.to_string()))
    }
}

/// Emblem lookup parameters.
#[derive(Debug, Deserialize)]
pub struct EmblemQuery {
    pub hash: Option<String>,
}

/// GET /api/profile - Profile with clan, competitive progression and emblem art.
pub async fn get_profile(
    State(state): State<AppState>,
    Query(params): Query<AccountQuery>,
) -> ApiResult<ProfileView> {
    let (membership_type, membership_id) = params.parse()?;

    let path = format!(
        "/Destiny2/{}/Profile/{}/?components={}",
        membership_type, membership_id, PROFILE_COMPONENTS
    );
    let profile: Value = state
        .upstream
        .fetch_envelope(&path, Method::GET, None)
        .await?;

    let clan = match fetch_clan(&state, membership_type, &membership_id).await {
        Ok(clan) => clan,
        Err(e) => {
            tracing::warn!("Clan lookup failed for {}: {}", membership_id, e);
            None
        }
    };

    let comp = competitive_progress(&profile);
    let emblem = profile_emblem(&state, &profile).await;

    success(ProfileView {
        profile,
        clan,
        comp,
        emblem,
    })
}

/// GET /api/comp - Competitive progression only; zeros when the profile has none.
pub async fn get_comp(
    State(state): State<AppState>,
    Query(params): Query<AccountQuery>,
) -> ApiResult<CompProgress> {
    let (membership_type, membership_id) = params.parse()?;

    let path = format!(
        "/Destiny2/{}/Profile/{}/?components=202",
        membership_type, membership_id
    );
    let profile: Value = state
        .upstream
        .fetch_envelope(&path, Method::GET, None)
        .await?;

    success(competitive_progress(&profile).unwrap_or_default())
}

/// GET /api/emblem - Resolve an emblem hash to asset URLs.
pub async fn get_emblem(
    State(state): State<AppState>,
    Query(params): Query<EmblemQuery>,
) -> ApiResult<EmblemResolution> {
    let hash = params.hash.as_deref().and_then(parse_emblem_hash);
    let resolution = state.emblems.resolve(&state.upstream, hash).await?;
    success(resolution)
}

async fn fetch_clan(
    state: &AppState,
    membership_type: i32,
    membership_id: &str,
) -> Result<Option<ClanInfo>, AppError> {
    let path = format!("/GroupV2/User/{}/{}/0/1/", membership_type, membership_id);
    let groups: Value = state
        .upstream
        .fetch_envelope(&path, Method::GET, None)
        .await?;

    let Some(group) = groups.pointer("/results/0/group") else {
        return Ok(None);
    };

    Ok(group.get("name").and_then(Value::as_str).map(|name| ClanInfo {
        name: name.to_string(),
        tag: group
            .pointer("/clanInfo/clanCallsign")
            .and_then(Value::as_str)
            .map(str::to_string),
    }))
}

/// First value of a `{ data: { <characterId>: ... } }` component.
fn first_component_entry<'a>(profile: &'a Value, component: &str) -> Option<&'a Value> {
    profile
        .get(component)?
        .get("data")?
        .as_object()?
        .values()
        .next()
}

/// Competitive progression of the first character, if present.
pub fn competitive_progress(profile: &Value) -> Option<CompProgress> {
    let progression = first_component_entry(profile, "characterProgressions")?
        .get("progressions")?
        .get(COMPETITIVE_PROGRESSION_HASH)?;

    let field = |name: &str| progression.get(name).and_then(Value::as_i64).unwrap_or(0);

    Some(CompProgress {
        points: field("currentProgress"),
        progress_to_next_level: field("progressToNextLevel"),
        next_level_at: field("nextLevelAt"),
    })
}

/// Emblem art for the first character.
///
/// Hash resolution wins; the character's own emblem paths are fallbacks.
async fn profile_emblem(state: &AppState, profile: &Value) -> EmblemView {
    let character = first_component_entry(profile, "characters");
    let character_path = |field: &str| {
        character
            .and_then(|c| c.get(field))
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(|p| state.upstream.asset_url(p))
    };

    let hash = character
        .and_then(|c| c.get("emblemHash"))
        .and_then(Value::as_i64);

    let resolution = match state.emblems.resolve(&state.upstream, hash).await {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::warn!("Emblem resolution failed for {:?}: {}", hash, e);
            EmblemResolution::default()
        }
    };

    EmblemView {
        icon: resolution.icon_url.or_else(|| character_path("emblemPath")),
        background: resolution
            .background_url
            .or_else(|| character_path("emblemBackgroundPath"))
            .unwrap_or_else(|| MISSING_EMBLEM_BACKGROUND.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_query_validation() {
        let ok = AccountQuery {
            membership_type: Some("3".into()),
            id: Some(" 4611686018400000001 ".into()),
        };
        assert_eq!(ok.parse().unwrap(), (3, "4611686018400000001".to_string()));

        let missing_type = AccountQuery {
            membership_type: None,
            id: Some("1".into()),
        };
        assert!(matches!(missing_type.parse(), Err(AppError::Validation(_))));

        let bad_id = AccountQuery {
            membership_type: Some("3".into()),
            id: Some("../Manifest".into()),
        };
        assert!(matches!(bad_id.parse(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_competitive_progress() {
        let profile = json!({
            "characterProgressions": { "data": { "2305843009": { "progressions": {
                "3696598664": {
                    "currentProgress": 2100,
                    "progressToNextLevel": 40,
                    "nextLevelAt": 100
                }
            }}}}
        });
        assert_eq!(
            competitive_progress(&profile),
            Some(CompProgress {
                points: 2100,
                progress_to_next_level: 40,
                next_level_at: 100,
            })
        );
        assert_eq!(competitive_progress(&json!({})), None);
    }
}
