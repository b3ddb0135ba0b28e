//! Unified error handling for the HTTP layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::ServiceError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// User is not authenticated.
    #[error("Não autenticado")]
    Unauthorized,

    /// Bad request from client.
    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    /// Session store failed.
    #[error("Erro de sessão: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Erro interno: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Forbidden(_) | ServiceError::AdminOnly => StatusCode::FORBIDDEN,
                ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Validation(_) | ServiceError::InvalidEmail(_) => {
                    StatusCode::BAD_REQUEST
                }
                ServiceError::Storage(_) | ServiceError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_internal(&self) -> bool {
        match self {
            Self::Service(err) => err.is_internal(),
            Self::Session(_) | Self::Internal(_) => true,
            Self::Unauthorized | Self::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.is_internal() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if self.is_internal() {
            "Erro interno do servidor".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencia_check_core::Permission;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("id inválido".to_string());
        assert_eq!(err.to_string(), "Requisição inválida: id inválido");

        let err = AppError::from(ServiceError::NotFound("Venda"));
        assert_eq!(err.to_string(), "Venda não encontrado");
    }

    #[test]
    fn test_service_errors_map_to_status_codes() {
        assert_eq!(
            get_status(ServiceError::Forbidden(Permission::ManageBackups).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ServiceError::AdminOnly.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ServiceError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(ServiceError::NotFound("Backup").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ServiceError::Conflict("duplicado".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ServiceError::Validation("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ServiceError::Internal("x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
