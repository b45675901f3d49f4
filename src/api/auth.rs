//! Login endpoints: provider OAuth sessions and the shared-secret admin cookie.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{success, ApiResponse, ApiResult};
use crate::auth::{
    clear_cookie, cookie_value, current_session, set_cookie, verify_admin_token, ADMIN_COOKIE,
    ADMIN_COOKIE_MAX_AGE, SESSION_COOKIE, SESSION_COOKIE_MAX_AGE,
};
use crate::errors::AppError;
use crate::identity::{pick_membership, MembershipLink};
use crate::models::{CanonicalIdentity, Session};
use crate::upstream::string_or_number;
use crate::AppState;

/// Cookie binding an authorization request to its callback.
pub const OAUTH_STATE_COOKIE: &str = "cc_oauth_state";

const OAUTH_STATE_MAX_AGE: i64 = 60 * 10;

/// OAuth callback parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Admin login body.
#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub token: String,
}

/// Admin login result.
#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub authenticated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkedMembership {
    #[serde(default)]
    membership_type: Option<i32>,
    #[serde(default, deserialize_with = "string_or_number")]
    membership_id: Option<String>,
    #[serde(default)]
    cross_save_override: Option<i32>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bungie_global_display_name: Option<String>,
    #[serde(default)]
    bungie_global_display_name_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUserMemberships {
    #[serde(default)]
    destiny_memberships: Vec<LinkedMembership>,
    #[serde(default, deserialize_with = "string_or_number")]
    primary_membership_id: Option<String>,
}

/// GET /api/auth/login - Redirect to the provider's authorization page.
pub async fn oauth_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let client_id = state
        .config
        .oauth_client_id
        .as_deref()
        .ok_or_else(|| AppError::Configuration("BUNGIE_CLIENT_ID is not configured".to_string()))?;

    let nonce = uuid::Uuid::new_v4().to_string();
    let mut params = vec![
        ("client_id", client_id),
        ("response_type", "code"),
        ("state", nonce.as_str()),
    ];
    if let Some(redirect_uri) = state.config.oauth_redirect_uri.as_deref() {
        params.push(("redirect_uri", redirect_uri));
    }

    let authorize = Url::parse_with_params(
        &format!("{}/en/OAuth/Authorize", state.upstream.base_url()),
        &params,
    )
    .map_err(|e| AppError::Configuration(format!("Invalid provider URL: {}", e)))?;

    Ok(redirect(
        authorize.as_str(),
        vec![set_cookie(
            OAUTH_STATE_COOKIE,
            &nonce,
            OAUTH_STATE_MAX_AGE,
            "Lax",
            state.config.secure_cookies,
        )],
    ))
}

/// GET /api/auth/callback - Finish the OAuth flow and open a session.
pub async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let code = params
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

    let expected_state = cookie_value(&headers, OAUTH_STATE_COOKIE);
    if expected_state.is_none() || expected_state != params.state {
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }

    let (client_id, client_secret) = match (
        state.config.oauth_client_id.as_deref(),
        state.config.oauth_client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => (id, secret),
        _ => {
            return Err(AppError::Configuration(
                "OAuth client credentials are not configured".to_string(),
            ))
        }
    };

    let token = state
        .upstream
        .exchange_oauth_code(client_id, client_secret, code)
        .await?;

    let memberships: CurrentUserMemberships = state
        .upstream
        .fetch_envelope_as_user("/User/GetMembershipsForCurrentUser/", &token.access_token)
        .await?;

    let identity = identity_from_memberships(&memberships)
        .ok_or_else(|| AppError::BadRequest("No Destiny membership found".to_string()))?;

    let is_admin = state.config.is_admin_membership(&identity.membership_id);
    let session = state.repo.create_session(&identity, is_admin).await?;
    tracing::info!(
        membership_id = %session.membership_id,
        is_admin,
        "Session opened"
    );

    let secure = state.config.secure_cookies;
    Ok(redirect(
        &format!("/profile/{}", session.membership_id),
        vec![
            set_cookie(
                SESSION_COOKIE,
                &session.token,
                SESSION_COOKIE_MAX_AGE,
                "Lax",
                secure,
            ),
            clear_cookie(OAUTH_STATE_COOKIE, secure),
        ],
    ))
}

/// POST /api/auth/logout - End the current session.
pub async fn oauth_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state.repo.delete_session(&token).await?;
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            clear_cookie(SESSION_COOKIE, state.config.secure_cookies),
        )]),
        ApiResponse::new(()),
    )
        .into_response())
}

/// GET /api/auth/me - The logged-in identity, or null.
pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Option<Session>> {
    success(current_session(&state.repo, &headers).await?)
}

/// POST /api/admin/login - Exchange the shared secret for the admin cookie.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Response, AppError> {
    if !verify_admin_token(state.config.admin_token.as_deref(), request.token.trim()) {
        tracing::warn!("Rejected admin login attempt");
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            set_cookie(
                ADMIN_COOKIE,
                request.token.trim(),
                ADMIN_COOKIE_MAX_AGE,
                "Strict",
                state.config.secure_cookies,
            ),
        )]),
        ApiResponse::new(AdminLoginResponse {
            authenticated: true,
        }),
    )
        .into_response())
}

/// POST /api/admin/logout - Drop the admin cookie.
pub async fn admin_logout(State(state): State<AppState>) -> Response {
    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_cookie(ADMIN_COOKIE, state.config.secure_cookies),
        )]),
        ApiResponse::new(AdminLoginResponse {
            authenticated: false,
        }),
    )
        .into_response()
}

/// Pick the account a login represents, using the same cross-save rules as search.
fn identity_from_memberships(memberships: &CurrentUserMemberships) -> Option<CanonicalIdentity> {
    let links: Vec<MembershipLink> = memberships
        .destiny_memberships
        .iter()
        .map(|m| MembershipLink {
            membership_type: m.membership_type,
            membership_id: m.membership_id.clone(),
            is_cross_save_primary: m.membership_id.is_some()
                && m.membership_id == memberships.primary_membership_id,
            cross_save_override: m.cross_save_override,
        })
        .collect();

    let picked = pick_membership(&links)?;
    let membership = memberships
        .destiny_memberships
        .iter()
        .find(|m| m.membership_id == picked.membership_id)?;

    let display_name = match (
        membership.bungie_global_display_name.as_deref(),
        membership.bungie_global_display_name_code,
    ) {
        (Some(name), Some(code)) if !name.is_empty() => format!("{}#{:04}", name, code),
        _ => membership.display_name.clone().unwrap_or_default(),
    };

    Some(CanonicalIdentity {
        display_name,
        membership_type: picked.membership_type?,
        membership_id: picked.membership_id.clone()?,
    })
}

fn redirect(location: &str, cookies: Vec<HeaderValue>) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    if let Ok(location) = HeaderValue::from_str(location) {
        headers.insert(header::LOCATION, location);
    }
    for cookie in cookies {
        headers.append(header::SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_identity_prefers_primary_membership() {
        let memberships: CurrentUserMemberships = serde_json::from_value(json!({
            "destinyMemberships": [
                { "membershipType": 2, "membershipId": "111", "crossSaveOverride": 3,
                  "displayName": "psn", "bungieGlobalDisplayName": "Ghost",
                  "bungieGlobalDisplayNameCode": 7 },
                { "membershipType": 3, "membershipId": "222", "crossSaveOverride": 3,
                  "displayName": "steam", "bungieGlobalDisplayName": "Ghost",
                  "bungieGlobalDisplayNameCode": 7 }
            ],
            "primaryMembershipId": "222"
        }))
        .unwrap();

        let identity = identity_from_memberships(&memberships).unwrap();
        assert_eq!(identity.membership_id, "222");
        assert_eq!(identity.membership_type, 3);
        assert_eq!(identity.display_name, "Ghost#0007");
    }

    #[test]
    fn test_login_identity_without_memberships() {
        let memberships: CurrentUserMemberships =
            serde_json::from_value(json!({ "destinyMemberships": [] })).unwrap();
        assert!(identity_from_memberships(&memberships).is_none());
    }

    #[test]
    fn test_redirect_sets_location_and_cookies() {
        let response = redirect(
            "/profile/1",
            vec![
                set_cookie(SESSION_COOKIE, "t", 10, "Lax", false),
                clear_cookie(OAUTH_STATE_COOKIE, false),
            ],
        );
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/profile/1");
        assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
