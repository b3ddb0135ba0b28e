//! Service-level error type.
//!
//! Messages are user-facing (pt-BR); the HTTP layer passes them through in
//! the `{success: false, message}` body for everything except internal
//! failures.

use thiserror::Error;

use agencia_check_core::{EmailError, Permission};

use crate::storage::StorageError;

/// Errors returned by the back-office services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The actor's role lacks the permission.
    #[error("Acesso negado: permissão {0} necessária")]
    Forbidden(Permission),

    /// The operation is restricted to admins.
    #[error("Acesso negado: apenas administradores")]
    AdminOnly,

    /// Email/password mismatch, unknown user or inactive user.
    #[error("Email ou senha inválidos")]
    InvalidCredentials,

    /// Referenced record does not exist.
    #[error("{0} não encontrado")]
    NotFound(&'static str),

    /// Uniqueness or state conflict.
    #[error("{0}")]
    Conflict(String),

    /// Input failed validation.
    #[error("Dados inválidos: {0}")]
    Validation(String),

    /// Invalid email input.
    #[error("Email inválido: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Persistence failure.
    #[error("Erro ao salvar dados: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected failure.
    #[error("Erro interno: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether this error is caused by the server rather than the request.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}

/// Convenience alias.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fail with [`ServiceError::Forbidden`] unless `actor` carries `permission`.
///
/// # Errors
///
/// Returns `Forbidden` when the role lacks the permission.
pub fn require(
    actor: &crate::models::CurrentUser,
    permission: Permission,
) -> ServiceResult<()> {
    if actor.can(permission) {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.id, role = %actor.role, permission = %permission, "Permission denied");
        Err(ServiceError::Forbidden(permission))
    }
}

/// Fail with [`ServiceError::AdminOnly`] unless `actor` is an admin.
///
/// # Errors
///
/// Returns `AdminOnly` for any non-admin role.
pub fn require_admin(actor: &crate::models::CurrentUser) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.id, role = %actor.role, "Admin-only operation denied");
        Err(ServiceError::AdminOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        let err = ServiceError::Forbidden(Permission::ManageBackups);
        assert_eq!(
            err.to_string(),
            "Acesso negado: permissão backups:manage necessária"
        );
        assert_eq!(
            ServiceError::NotFound("Backup").to_string(),
            "Backup não encontrado"
        );
    }

    #[test]
    fn test_internal_classification() {
        assert!(ServiceError::Internal("x".into()).is_internal());
        assert!(!ServiceError::AdminOnly.is_internal());
        assert!(!ServiceError::InvalidCredentials.is_internal());
    }
}
