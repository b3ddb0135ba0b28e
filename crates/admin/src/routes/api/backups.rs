//! Backup API handlers. Everything here needs `backups:manage`.

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;

use agencia_check_core::{BackupConfigId, BackupId};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{BackupConfig, BackupConfigUpdate, BackupItem, BackupRequest, NewBackupConfig};
use crate::services::{RestoreSource, RestoreSummary};
use crate::state::AppState;

use super::{ApiResponse, ApiResult};

/// Build the backups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/backups", get(list).post(create))
        .route("/api/backups/restore", post(restore_upload))
        .route("/api/backups/cleanup", post(cleanup))
        .route("/api/backups/configs", get(list_configs).post(create_config))
        .route(
            "/api/backups/configs/{id}",
            patch(update_config).delete(delete_config),
        )
        .route("/api/backups/{id}", get(show).delete(remove))
        .route("/api/backups/{id}/download", get(download))
        .route("/api/backups/{id}/restore", post(restore))
}

/// List backups, newest first.
///
/// # Errors
///
/// Returns 403 without `backups:manage`.
pub async fn list(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<BackupItem>> {
    Ok(Json(ApiResponse::data(state.backups().list(&actor).await?)))
}

/// Show one backup and its progress.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404 for an unknown id.
pub async fn show(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupId>,
) -> ApiResult<BackupItem> {
    Ok(Json(ApiResponse::data(state.backups().get(&actor, id).await?)))
}

/// Start a backup. Answers the `pending` record immediately.
///
/// # Errors
///
/// Returns 403 without `backups:manage`.
pub async fn create(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    body: Option<Json<BackupRequest>>,
) -> ApiResult<BackupItem> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let item = state.backups().create_backup(&actor, request).await?;
    Ok(Json(ApiResponse::with_message(item, "Backup iniciado")))
}

/// Download a completed backup file.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404 for an unknown id, 409 when the
/// file is no longer available.
pub async fn download(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupId>,
) -> Result<Response, AppError> {
    let (item, artifact) = state.backups().download(&actor, id).await?;
    let filename = format!(
        "backup-{}-{}.json",
        item.kind.as_str(),
        item.created_at.format("%Y%m%d-%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from(Bytes::from(artifact.bytes.to_vec())),
    )
        .into_response())
}

/// Restore the data sections of a stored backup.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404/409 when the file is missing,
/// 400 for an invalid file or a users-only backup.
pub async fn restore(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupId>,
) -> ApiResult<RestoreSummary> {
    let summary = state
        .backups()
        .restore(&actor, RestoreSource::Backup(id))
        .await?;
    Ok(Json(ApiResponse::with_message(
        summary,
        "Backup restaurado com sucesso",
    )))
}

/// Restore from an uploaded backup file (raw JSON body).
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 400 for an invalid file.
pub async fn restore_upload(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<RestoreSummary> {
    let summary = state
        .backups()
        .restore(&actor, RestoreSource::Payload(body.to_vec()))
        .await?;
    Ok(Json(ApiResponse::with_message(
        summary,
        "Backup restaurado com sucesso",
    )))
}

/// Delete a backup and its file.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404 for an unknown id.
pub async fn remove(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupId>,
) -> ApiResult<()> {
    state.backups().delete(&actor, id).await?;
    Ok(Json(ApiResponse::message("Backup excluído com sucesso")))
}

/// Cleanup query.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    pub retention_days: Option<i64>,
}

/// Delete backups older than the retention window.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 400 for a retention below one day.
pub async fn cleanup(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<usize> {
    let removed = state
        .backups()
        .cleanup_expired(&actor, query.retention_days)
        .await?;
    Ok(Json(ApiResponse::with_message(
        removed,
        format!("{removed} backups expirados removidos"),
    )))
}

/// List backup schedules.
///
/// # Errors
///
/// Returns 403 without `backups:manage`.
pub async fn list_configs(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<BackupConfig>> {
    Ok(Json(ApiResponse::data(
        state.backups().list_configs(&actor).await?,
    )))
}

/// Create a backup schedule.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 400 for invalid input.
pub async fn create_config(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewBackupConfig>,
) -> ApiResult<BackupConfig> {
    let config = state.backups().create_config(&actor, body).await?;
    Ok(Json(ApiResponse::with_message(config, "Agendamento criado")))
}

/// Update a backup schedule.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404 for an unknown id.
pub async fn update_config(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupConfigId>,
    Json(body): Json<BackupConfigUpdate>,
) -> ApiResult<BackupConfig> {
    let config = state.backups().update_config(&actor, id, body).await?;
    Ok(Json(ApiResponse::with_message(config, "Agendamento atualizado")))
}

/// Delete a backup schedule.
///
/// # Errors
///
/// Returns 403 without `backups:manage`, 404 for an unknown id.
pub async fn delete_config(
    RequireAuth(actor): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BackupConfigId>,
) -> ApiResult<()> {
    state.backups().delete_config(&actor, id).await?;
    Ok(Json(ApiResponse::message("Agendamento excluído")))
}
