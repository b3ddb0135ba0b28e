//! Inventory API handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};

use agencia_check_core::ProductId;

use crate::middleware::RequireAuth;
use crate::models::{InventoryItem, NewInventoryItem, StockAdjustment};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the inventory router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inventory", get(list).post(create))
        .route("/api/inventory/low-stock", get(low_stock))
        .route("/api/inventory/{id}", delete(remove))
        .route("/api/inventory/{id}/adjust", post(adjust))
}

/// List inventory items.
///
/// # Errors
///
/// Returns 403 without `inventory:view`.
pub async fn list(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<InventoryItem>> {
    Ok(Json(ApiResponse::data(
        state.data().list_inventory(&actor).await?,
    )))
}

/// Items at or below their minimum quantity.
///
/// # Errors
///
/// Returns 403 without `inventory:view`.
pub async fn low_stock(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<InventoryItem>> {
    Ok(Json(ApiResponse::data(state.data().low_stock(&actor).await?)))
}

/// Add an item.
///
/// # Errors
///
/// Returns 403 without `inventory:manage`, 409 for a duplicate SKU.
pub async fn create(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewInventoryItem>,
) -> ApiResult<InventoryItem> {
    let item = state.data().create_item(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(item, "Produto cadastrado com sucesso")))
}

/// Adjust stock by a signed delta.
///
/// # Errors
///
/// Returns 403 without `inventory:manage`, 404 for an unknown id, 400 when
/// the stock would go negative.
pub async fn adjust(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<StockAdjustment>,
) -> ApiResult<InventoryItem> {
    let item = state.data().adjust_stock(&actor, id, body.delta).await?;
    Ok(Json(ApiResponse::with_message(item, "Estoque atualizado")))
}

/// Delete an item.
///
/// # Errors
///
/// Returns 403 without `inventory:manage`, 404 for an unknown id.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ApiResult<()> {
    state.data().delete_item(&actor, id).await?;
    Ok(Json(ApiResponse::message("Produto excluído com sucesso")))
}
