//! REST API module.
//!
//! Public read routes, the login flow, and the admin-only write routes.

mod auth;
mod badges;
mod profile;
mod search;
mod settings;
mod trials;

pub use auth::*;
pub use badges::*;
pub use profile::*;
pub use search::*;
pub use settings::*;
pub use trials::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Default page size for list routes.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Maximum page size for list routes.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Clamp a caller-supplied limit into `1..=MAX_LIST_LIMIT`.
pub fn list_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}
