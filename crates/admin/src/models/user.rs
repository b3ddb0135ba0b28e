//! Back-office user types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agencia_check_core::{Email, UserId, UserRole, permission_keys};

/// A back-office user (domain type).
///
/// Holds the password hash, so it is never serialized directly; use
/// [`UserView`] for anything leaving the service.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (normalized, unique).
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role, which fixes the permission set.
    pub role: UserRole,
    /// Inactive users cannot log in.
    pub is_active: bool,
    /// Permission keys derived from `role`.
    pub permissions: Vec<String>,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Change the role and recompute the cached permission keys.
    pub fn set_role(&mut self, role: UserRole) {
        self.role = role;
        self.permissions = permission_keys(role);
    }
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            is_active: user.is_active,
            permissions: user.permissions.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub password: String,
}

/// Partial update of a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}
