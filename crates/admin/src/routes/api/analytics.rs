//! Analytics API handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use agencia_check_core::Permission;

use crate::middleware::RequireAuth;
use crate::services::error::require;
use crate::services::{AnalyticsFilters, DashboardMetrics};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the analytics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/dashboard", get(dashboard))
        .route("/api/analytics/cache/invalidate", post(invalidate))
}

/// Dashboard metrics for the filtered window.
///
/// Query: `start`, `end` (RFC 3339), `reseller_id`, `status`.
///
/// # Errors
///
/// Returns 403 without `analytics:view`, 400 for an inverted window.
pub async fn dashboard(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Query(filters): Query<AnalyticsFilters>,
) -> ApiResult<DashboardMetrics> {
    let metrics = state.analytics().dashboard(&actor, &filters).await?;
    Ok(Json(ApiResponse::data(DashboardMetrics::clone(&metrics))))
}

/// Drop every memoized bundle.
///
/// # Errors
///
/// Returns 403 without `analytics:view`.
pub async fn invalidate(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<()> {
    require(&actor, Permission::ViewAnalytics)?;
    state.analytics().invalidate_cache().await;
    Ok(Json(ApiResponse::message("Cache de métricas limpo")))
}
