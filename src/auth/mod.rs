//! Admin gate and session cookie handling.
//!
//! The admin cookie holds the shared secret and is compared in constant time. The
//! session cookie holds an opaque token resolved against the `sessions` table; nothing
//! the client sends is trusted for an admin decision.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Session;

/// Cookie carrying the shared admin secret.
pub const ADMIN_COOKIE: &str = "cc_admin";

/// Cookie carrying the login session token.
pub const SESSION_COOKIE: &str = "cc_session";

/// Admin cookie lifetime.
pub const ADMIN_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 7;

/// Session cookie lifetime.
pub const SESSION_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 30;

/// What the admin middleware needs to decide.
#[derive(Clone)]
pub struct AdminGuard {
    pub admin_token: Option<String>,
    pub repo: Arc<Repository>,
}

/// Admin authentication layer: admits the shared-secret cookie or an admin session.
pub async fn admin_auth_layer(guard: AdminGuard, request: Request, next: Next) -> Response {
    let headers = request.headers();

    if let (Some(expected), Some(provided)) = (
        guard.admin_token.as_deref(),
        cookie_value(headers, ADMIN_COOKIE),
    ) {
        if constant_time_compare(&provided, expected) {
            return next.run(request).await;
        }
    }

    let session = current_session(&guard.repo, headers).await;
    match session {
        Ok(Some(session)) if session.is_admin => next.run(request).await,
        Ok(_) => AppError::Unauthorized("Admin access required".to_string()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Resolve the session cookie, if any, to a live session.
pub async fn current_session(
    repo: &Repository,
    headers: &HeaderMap,
) -> Result<Option<Session>, AppError> {
    match cookie_value(headers, SESSION_COOKIE) {
        Some(token) => repo.get_session(&token).await,
        None => Ok(None),
    }
}

/// Check a submitted admin token against the configured secret.
pub fn verify_admin_token(expected: Option<&str>, provided: &str) -> bool {
    match expected {
        Some(expected) if !provided.is_empty() => constant_time_compare(provided, expected),
        _ => false,
    }
}

/// Find a cookie by name in the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Build a `Set-Cookie` value.
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: i64,
    same_site: &str,
    secure: bool,
) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        name, value, same_site, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    // Names and values are ASCII tokens chosen by us.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Build a `Set-Cookie` value that removes a cookie.
pub fn clear_cookie(name: &str, secure: bool) -> HeaderValue {
    set_cookie(name, "", 0, "Lax", secure)
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_verify_admin_token() {
        assert!(verify_admin_token(Some("secret"), "secret"));
        assert!(!verify_admin_token(Some("secret"), "guess"));
        assert!(!verify_admin_token(Some("secret"), ""));
        assert!(!verify_admin_token(None, "secret"));
        assert!(!verify_admin_token(None, ""));
    }

    #[test]
    fn test_cookie_value_parsing() {
        let headers = headers_with_cookie("theme=dark; cc_admin=s3cret; cc_session=abc-123");
        assert_eq!(cookie_value(&headers, ADMIN_COOKIE).as_deref(), Some("s3cret"));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("abc-123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_ignores_prefix_matches_and_empty_values() {
        let headers = headers_with_cookie("xcc_admin=nope; cc_admin=");
        assert_eq!(cookie_value(&headers, ADMIN_COOKIE), None);
    }

    #[test]
    fn test_set_cookie_format() {
        let cookie = set_cookie(ADMIN_COOKIE, "tok", 60, "Strict", true);
        assert_eq!(
            cookie.to_str().unwrap(),
            "cc_admin=tok; Path=/; HttpOnly; SameSite=Strict; Max-Age=60; Secure"
        );
        let cleared = clear_cookie(SESSION_COOKIE, false);
        assert_eq!(
            cleared.to_str().unwrap(),
            "cc_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
