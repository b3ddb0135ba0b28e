//! Login, logout and the current session.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use agencia_check_core::permission_keys;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::{TemplateId, TemplateVars};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The logged-in user with the permission keys the UI gates on.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    #[serde(flatten)]
    pub user: CurrentUser,
    pub permissions: Vec<String>,
}

impl From<CurrentUser> for SessionUser {
    fn from(user: CurrentUser) -> Self {
        let permissions = permission_keys(user.role);
        Self { user, permissions }
    }
}

/// Authenticate with email and password.
///
/// The session id is cycled on login. A `user_login` notification is
/// emitted.
///
/// # Errors
///
/// Returns 401 with one generic message for any credential failure.
#[tracing::instrument(skip_all, fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> ApiResult<SessionUser> {
    let user = state
        .users()
        .authenticate(&body.email, &body.password)
        .await?;

    session.cycle_id().await?;
    set_current_user(&session, &user).await?;
    set_sentry_user(user.id.as_i32(), Some(user.email.as_str()));

    if let Err(e) = state
        .notifications()
        .notify(
            TemplateId::UserLogin,
            &TemplateVars::new().with("name", &user.name),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to emit login notification");
    }

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(ApiResponse::with_message(
        user.into(),
        "Login realizado com sucesso",
    )))
}

/// End the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn logout(
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> ApiResult<()> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    if let Some(user) = user {
        tracing::info!(user_id = %user.id, "User logged out");
    }
    Ok(Json(ApiResponse::message("Logout realizado")))
}

/// The current user.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn me(RequireAuth(user): RequireAuth) -> ApiResult<SessionUser> {
    Ok(Json(ApiResponse::data(user.into())))
}
