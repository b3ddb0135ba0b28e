//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (storage reachable)
//!
//! # Auth
//! POST /api/auth/login                  - Email + password login
//! POST /api/auth/logout                 - Logout
//! GET  /api/auth/me                     - Current user and permission keys
//!
//! # Users (admin only for writes)
//! GET|POST          /api/users
//! GET|PATCH|DELETE  /api/users/{id}
//!
//! # Sales, resellers, inventory
//! GET|POST          /api/sales
//! GET|PATCH|DELETE  /api/sales/{id}
//! GET|POST          /api/resellers
//! PATCH|DELETE      /api/resellers/{id}
//! GET|POST          /api/inventory
//! GET               /api/inventory/low-stock
//! POST              /api/inventory/{id}/adjust
//! DELETE            /api/inventory/{id}
//!
//! # Analytics
//! GET  /api/analytics/dashboard?start&end&reseller_id&status
//! POST /api/analytics/cache/invalidate
//!
//! # Notifications
//! GET|DELETE /api/notifications
//! POST       /api/notifications/{id}/read
//! POST       /api/notifications/read-all
//! DELETE     /api/notifications/{id}
//! GET|PUT    /api/notifications/settings
//! POST       /api/notifications/queue/process
//! GET        /api/notifications/feed
//!
//! # Backups
//! GET|POST      /api/backups
//! GET|DELETE    /api/backups/{id}
//! GET           /api/backups/{id}/download
//! POST          /api/backups/{id}/restore
//! POST          /api/backups/restore          - restore an uploaded file
//! POST          /api/backups/cleanup?retention_days
//! GET|POST      /api/backups/configs
//! PATCH|DELETE  /api/backups/configs/{id}
//! ```

pub mod api;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{create_session_layer, with_security_headers};
use crate::state::AppState;

/// Build the route table (without layers or state).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(api::router())
}

/// Build the complete application: routes, sessions, request tracing,
/// security headers and the Sentry layers.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.is_secure());

    let router = routes().layer(session_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    status = tracing::field::Empty,
                    latency_ms = tracing::field::Empty,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>, latency: std::time::Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                },
            ),
    );

    with_security_headers(router)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies that persisted state can be read. Returns 503 otherwise.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state
        .storage()
        .load::<serde_json::Value>(crate::storage::keys::BACKUPS)
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
