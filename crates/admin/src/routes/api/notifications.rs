//! Notification API handlers.
//!
//! Reading and marking as read is open to every logged-in user; deleting,
//! clearing, flushing the queue and changing settings need
//! `notifications:manage`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::Serialize;

use agencia_check_core::{NotificationId, Permission};

use crate::middleware::RequireAuth;
use crate::models::{Notification, NotificationFilter, NotificationSettings};
use crate::services::FeedStatus;
use crate::services::error::require;
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list).delete(clear_all))
        .route("/api/notifications/read-all", post(mark_all_as_read))
        .route(
            "/api/notifications/settings",
            get(settings).put(update_settings),
        )
        .route("/api/notifications/queue/process", post(process_queue))
        .route("/api/notifications/feed", get(feed_status))
        .route("/api/notifications/{id}", delete(remove))
        .route("/api/notifications/{id}/read", post(mark_as_read))
}

/// A page of notifications with the counters the bell shows.
#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread_count: usize,
    pub queued_count: usize,
}

/// List notifications, newest first.
///
/// Query: `category`, `unread_only`, `limit`.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn list(
    RequireAuth(_actor): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> ApiResult<NotificationList> {
    let notifications = state.notifications();
    Ok(Json(ApiResponse::data(NotificationList {
        items: notifications.list(&filter).await,
        unread_count: notifications.unread_count().await,
        queued_count: notifications.queued_count().await,
    })))
}

/// Mark one notification as read.
///
/// # Errors
///
/// Returns 404 for an unknown id.
pub async fn mark_as_read(
    RequireAuth(_actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> ApiResult<()> {
    state.notifications().mark_as_read(id).await?;
    Ok(Json(ApiResponse::message("Notificação marcada como lida")))
}

/// Mark every notification as read. Answers how many changed.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn mark_all_as_read(
    RequireAuth(_actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<usize> {
    let changed = state.notifications().mark_all_as_read().await?;
    Ok(Json(ApiResponse::with_message(
        changed,
        "Todas as notificações foram marcadas como lidas",
    )))
}

/// Delete one notification.
///
/// # Errors
///
/// Returns 403 without `notifications:manage`, 404 for an unknown id.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> ApiResult<()> {
    require(&actor, Permission::ManageNotifications)?;
    state.notifications().delete(id).await?;
    Ok(Json(ApiResponse::message("Notificação excluída")))
}

/// Delete every notification.
///
/// # Errors
///
/// Returns 403 without `notifications:manage`.
pub async fn clear_all(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<usize> {
    let removed = state.notifications().clear_all(&actor).await?;
    Ok(Json(ApiResponse::with_message(
        removed,
        "Notificações removidas",
    )))
}

/// Current notification settings.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn settings(
    RequireAuth(_actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<NotificationSettings> {
    Ok(Json(ApiResponse::data(state.notifications().settings().await)))
}

/// Replace the notification settings.
///
/// # Errors
///
/// Returns 403 without `notifications:manage`.
pub async fn update_settings(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NotificationSettings>,
) -> ApiResult<NotificationSettings> {
    let settings = state.notifications().update_settings(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(
        settings,
        "Configurações salvas",
    )))
}

/// Deliver everything held back during quiet hours.
///
/// # Errors
///
/// Returns 403 without `notifications:manage`.
pub async fn process_queue(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<usize> {
    require(&actor, Permission::ManageNotifications)?;
    let delivered = state.notifications().process_queue().await?;
    Ok(Json(ApiResponse::with_message(
        delivered,
        format!("{delivered} notificações entregues"),
    )))
}

/// Real-time feed connection state.
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn feed_status(
    RequireAuth(_actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<FeedStatus> {
    Ok(Json(ApiResponse::data(state.feed_status())))
}
