//! JSON API route handlers.
//!
//! Every handler answers `{ "success": true, "message"?, "data"? }` on
//! success; errors go through [`AppError`](crate::error::AppError) and answer
//! `{ "success": false, "message" }`.

pub mod analytics;
pub mod auth;
pub mod backups;
pub mod inventory;
pub mod notifications;
pub mod resellers;
pub mod sales;
pub mod users;

use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// Standard API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Successful response carrying `data` and a message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Result type of every API handler.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(sales::router())
        .merge(resellers::router())
        .merge(inventory::router())
        .merge(analytics::router())
        .merge(notifications::router())
        .merge(backups::router())
}
