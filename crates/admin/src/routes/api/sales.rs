//! Sales API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};

use agencia_check_core::SaleId;

use crate::middleware::RequireAuth;
use crate::models::{NewSale, Sale, SaleUpdate};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the sales router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(list).post(create))
        .route("/api/sales/{id}", patch(update).get(show).delete(remove))
}

/// List sales, newest first.
///
/// # Errors
///
/// Returns 403 without `sales:view`.
pub async fn list(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<Sale>> {
    Ok(Json(ApiResponse::data(state.data().list_sales(&actor).await?)))
}

/// Show one sale.
///
/// # Errors
///
/// Returns 403 without `sales:view`, 404 for an unknown id.
pub async fn show(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
) -> ApiResult<Sale> {
    Ok(Json(ApiResponse::data(state.data().get_sale(&actor, id).await?)))
}

/// Register a sale.
///
/// # Errors
///
/// Returns 403 without `sales:manage`, 400 for a non-positive value.
pub async fn create(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewSale>,
) -> ApiResult<Sale> {
    let sale = state.data().create_sale(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(sale, "Venda registrada com sucesso")))
}

/// Update a sale.
///
/// # Errors
///
/// Returns 403 without `sales:manage`, 404 for an unknown id.
pub async fn update(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
    Json(body): Json<SaleUpdate>,
) -> ApiResult<Sale> {
    let sale = state.data().update_sale(&actor, id, body).await?;
    Ok(Json(ApiResponse::with_message(sale, "Venda atualizada com sucesso")))
}

/// Delete a sale.
///
/// # Errors
///
/// Returns 403 without `sales:manage`, 404 for an unknown id.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
) -> ApiResult<()> {
    state.data().delete_sale(&actor, id).await?;
    Ok(Json(ApiResponse::message("Venda excluída com sucesso")))
}
