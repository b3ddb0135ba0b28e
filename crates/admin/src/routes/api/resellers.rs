//! Reseller (revendedor) API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};

use agencia_check_core::ResellerId;

use crate::middleware::RequireAuth;
use crate::models::{NewReseller, Reseller, ResellerUpdate};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the resellers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/resellers", get(list).post(create))
        .route("/api/resellers/{id}", patch(update).delete(remove))
}

/// List resellers.
///
/// # Errors
///
/// Returns 403 without `resellers:view`.
pub async fn list(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<Reseller>> {
    Ok(Json(ApiResponse::data(
        state.data().list_resellers(&actor).await?,
    )))
}

/// Register a reseller.
///
/// # Errors
///
/// Returns 403 without `resellers:manage`, 409 for a duplicate email, 400
/// for an invalid email or commission.
pub async fn create(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewReseller>,
) -> ApiResult<Reseller> {
    let reseller = state.data().create_reseller(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(
        reseller,
        "Revendedor cadastrado com sucesso",
    )))
}

/// Update a reseller.
///
/// # Errors
///
/// Returns 403 without `resellers:manage`, 404 for an unknown id.
pub async fn update(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ResellerId>,
    Json(body): Json<ResellerUpdate>,
) -> ApiResult<Reseller> {
    let reseller = state.data().update_reseller(&actor, id, body).await?;
    Ok(Json(ApiResponse::with_message(
        reseller,
        "Revendedor atualizado com sucesso",
    )))
}

/// Delete a reseller.
///
/// # Errors
///
/// Returns 403 without `resellers:manage`, 404 for an unknown id.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ResellerId>,
) -> ApiResult<()> {
    state.data().delete_reseller(&actor, id).await?;
    Ok(Json(ApiResponse::message("Revendedor excluído com sucesso")))
}
