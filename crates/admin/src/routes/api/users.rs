//! User management API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};

use agencia_check_core::UserId;

use crate::middleware::RequireAuth;
use crate::models::{NewUser, UserUpdate, UserView};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list).post(create))
        .route("/api/users/{id}", patch(update).get(show).delete(remove))
}

/// List users.
///
/// # Errors
///
/// Returns 403 without the `users:manage` permission.
pub async fn list(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<UserView>> {
    let users = state.users().list(&actor).await?;
    Ok(Json(ApiResponse::data(users)))
}

/// Show one user.
///
/// # Errors
///
/// Returns 403 without `users:manage`, 404 for an unknown id.
pub async fn show(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> ApiResult<UserView> {
    let user = state.users().get(&actor, id).await?;
    Ok(Json(ApiResponse::data(user)))
}

/// Create a user (admin only).
///
/// # Errors
///
/// Returns 403 for non-admins, 409 for a duplicate email, 400 for invalid
/// input.
pub async fn create(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ApiResult<UserView> {
    let user = state.users().create(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(user, "Usuário criado com sucesso")))
}

/// Update a user (admin only).
///
/// # Errors
///
/// Returns 403 for non-admins, 404 for an unknown id, 409 for an email
/// conflict.
pub async fn update(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<UserUpdate>,
) -> ApiResult<UserView> {
    let user = state.users().update(&actor, id, body).await?;
    Ok(Json(ApiResponse::with_message(
        user,
        "Usuário atualizado com sucesso",
    )))
}

/// Delete a user (admin only).
///
/// # Errors
///
/// Returns 403 for non-admins, 404 for an unknown id, 409 when deleting
/// oneself.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> ApiResult<()> {
    state.users().delete(&actor, id).await?;
    Ok(Json(ApiResponse::message("Usuário excluído com sucesso")))
}
