//! Backups: snapshot, export, restore and scheduled runs.
//!
//! A backup record is returned as `pending` as soon as it is requested. A
//! tracked job then walks it through `running` in 20-point progress steps,
//! writes the payload to the [`ArtifactStore`] and marks it `completed` (or
//! `failed`). Completion and failure are announced through the notification
//! service.
//!
//! Records and schedules are persisted through [`Storage`]; artifact URLs are
//! not, so downloads do not survive a restart.

pub mod payload;
pub mod schedule;

pub use payload::{BackupPayload, PayloadError, SectionCounts};
pub use schedule::next_run;

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use agencia_check_core::{BackupConfigId, BackupId, BackupKind, BackupStatus, Permission};

use crate::artifacts::{Artifact, ArtifactStore};
use crate::clock::SharedClock;
use crate::config::ServiceSettings;
use crate::models::{
    BackupConfig, BackupConfigUpdate, BackupItem, BackupRequest, CurrentUser, NewBackupConfig,
};
use crate::storage::{Storage, keys};
use crate::tasks::{BackgroundTasks, TaskKind};

use super::data_store::{DataSections, DataStore};
use super::error::{ServiceError, ServiceResult, require};
use super::notifications::{NotificationService, TemplateId, TemplateVars};
use super::users::UserService;

const PROGRESS_STEP: u8 = 20;

/// Services the backup jobs read from and report to.
#[derive(Clone)]
pub struct BackupDeps {
    pub storage: Storage,
    pub artifacts: ArtifactStore,
    pub data: DataStore,
    pub users: UserService,
    pub notifications: NotificationService,
    pub clock: SharedClock,
    pub tasks: BackgroundTasks,
}

/// Where a restore reads from.
#[derive(Debug, Clone)]
pub enum RestoreSource {
    /// A completed backup's artifact.
    Backup(BackupId),
    /// An uploaded backup file.
    Payload(Vec<u8>),
}

/// What a restore wrote back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub kind: BackupKind,
    pub restored: SectionCounts,
}

/// Which backups a retention pass may remove.
#[derive(Debug, Clone)]
enum RetentionScope {
    /// Every backup.
    All,
    /// Backups made by one schedule.
    Config(BackupConfigId),
    /// Backups not owned by any of these schedules.
    Unscheduled(Vec<BackupConfigId>),
}

impl RetentionScope {
    fn covers(&self, item: &BackupItem) -> bool {
        match self {
            Self::All => true,
            Self::Config(id) => item.config_id == Some(*id),
            Self::Unscheduled(owned) => item.config_id.is_none_or(|id| !owned.contains(&id)),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// Newest first.
    backups: Vec<BackupItem>,
    configs: Vec<BackupConfig>,
}

struct Inner {
    state: RwLock<State>,
    persist_lock: Mutex<()>,
    deps: BackupDeps,
    timezone: FixedOffset,
    step_delay: Duration,
    retention_days: i64,
    scheduler_interval: Duration,
}

/// Handle to the backup service. Cheap to clone.
#[derive(Clone)]
pub struct BackupService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupService")
            .field("retention_days", &self.inner.retention_days)
            .finish_non_exhaustive()
    }
}

impl BackupService {
    /// Build the service, restoring records and schedules from storage.
    ///
    /// Records left `pending` or `running` by a previous process are marked
    /// failed, and download URLs from a previous process are cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state exists but cannot be read.
    pub async fn load(deps: BackupDeps, settings: &ServiceSettings) -> ServiceResult<Self> {
        let mut backups: Vec<BackupItem> = deps
            .storage
            .load(keys::BACKUPS)
            .await?
            .unwrap_or_default();
        let configs: Vec<BackupConfig> = deps
            .storage
            .load(keys::BACKUP_CONFIGS)
            .await?
            .unwrap_or_default();

        let now = deps.clock.now();
        for item in &mut backups {
            item.download_url = None;
            if !item.status.is_terminal() {
                item.status = BackupStatus::Failed;
                item.error = Some("Backup interrompido pela reinicialização".into());
                item.completed_at = Some(now);
            }
        }

        tracing::info!(
            backups = backups.len(),
            configs = configs.len(),
            "Backup service ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State { backups, configs }),
                persist_lock: Mutex::new(()),
                deps,
                timezone: settings.timezone,
                step_delay: settings.backup_step_delay,
                retention_days: settings.backup_retention_days,
                scheduler_interval: settings.backup_scheduler_interval,
            }),
        })
    }

    async fn persist(&self) -> ServiceResult<()> {
        let _guard = self.inner.persist_lock.lock().await;
        let (backups, configs) = {
            let state = self.inner.state.read().await;
            (state.backups.clone(), state.configs.clone())
        };
        self.inner.deps.storage.save(keys::BACKUPS, &backups).await?;
        self.inner
            .deps
            .storage
            .save(keys::BACKUP_CONFIGS, &configs)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Backups
    // =========================================================================

    /// Every backup, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`.
    pub async fn list(&self, actor: &CurrentUser) -> ServiceResult<Vec<BackupItem>> {
        require(actor, Permission::ManageBackups)?;
        Ok(self.inner.state.read().await.backups.clone())
    }

    /// One backup.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound` for an unknown
    /// id.
    pub async fn get(&self, actor: &CurrentUser, id: BackupId) -> ServiceResult<BackupItem> {
        require(actor, Permission::ManageBackups)?;
        self.find(id).await.ok_or(ServiceError::NotFound("Backup"))
    }

    async fn find(&self, id: BackupId) -> Option<BackupItem> {
        self.inner
            .state
            .read()
            .await
            .backups
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    /// Request a backup. Returns the `pending` record immediately.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn create_backup(
        &self,
        actor: &CurrentUser,
        request: BackupRequest,
    ) -> ServiceResult<BackupItem> {
        require(actor, Permission::ManageBackups)?;
        self.start_backup(request.kind, request.name, None).await
    }

    async fn start_backup(
        &self,
        kind: BackupKind,
        name: Option<String>,
        config_id: Option<BackupConfigId>,
    ) -> ServiceResult<BackupItem> {
        let now = self.inner.deps.clock.now();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Backup {} {}",
                    kind.as_str(),
                    now.with_timezone(&self.inner.timezone)
                        .format("%d/%m/%Y %H:%M")
                )
            });

        let item = BackupItem {
            id: BackupId::generate(),
            name,
            kind,
            status: BackupStatus::Pending,
            progress: 0,
            size_bytes: None,
            checksum: None,
            download_url: None,
            error: None,
            created_at: now,
            completed_at: None,
            config_id,
        };
        self.inner.state.write().await.backups.insert(0, item.clone());
        self.persist().await?;

        let service = self.clone();
        let id = item.id;
        self.inner
            .deps
            .tasks
            .spawn("backup_job", TaskKind::Job, async move {
                service.run_backup(id).await;
            });

        tracing::info!(backup_id = %item.id, kind = kind.as_str(), "Backup requested");
        Ok(item)
    }

    /// Apply `f` to a record. Returns `None` if the record is gone.
    async fn update_item(
        &self,
        id: BackupId,
        f: impl FnOnce(&mut BackupItem),
    ) -> Option<BackupItem> {
        let updated = {
            let mut state = self.inner.state.write().await;
            let item = state.backups.iter_mut().find(|b| b.id == id)?;
            f(item);
            item.clone()
        };
        if let Err(e) = self.persist().await {
            tracing::warn!(backup_id = %id, error = %e, "Failed to persist backup state");
        }
        Some(updated)
    }

    #[instrument(skip(self))]
    async fn run_backup(&self, id: BackupId) {
        let shutdown = self.inner.deps.tasks.shutdown_token();
        let Some(item) = self
            .update_item(id, |b| b.status = BackupStatus::Running)
            .await
        else {
            return;
        };

        for step in 1..(100 / PROGRESS_STEP) {
            tokio::select! {
                () = shutdown.cancelled() => {
                    self.fail(id, &item.name, "Backup interrompido pelo desligamento").await;
                    return;
                }
                () = tokio::time::sleep(self.inner.step_delay) => {}
            }
            if self
                .update_item(id, |b| b.progress = step * PROGRESS_STEP)
                .await
                .is_none()
            {
                tracing::info!("Backup deleted while running");
                return;
            }
        }

        let snapshot = self.inner.deps.data.snapshot().await;
        let users = if item.kind.includes(BackupKind::Users) {
            self.inner.deps.users.export().await
        } else {
            Vec::new()
        };
        let bytes = match BackupPayload::capture(
            item.kind,
            self.inner.deps.clock.now(),
            snapshot,
            users,
        )
        .and_then(|payload| Ok((payload.checksum.clone(), payload.to_bytes()?)))
        {
            Ok(result) => result,
            Err(e) => {
                self.fail(id, &item.name, &e.to_string()).await;
                return;
            }
        };
        let (checksum, bytes) = bytes;
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        let url = self
            .inner
            .deps
            .artifacts
            .create(bytes, payload::CONTENT_TYPE)
            .await;

        let now = self.inner.deps.clock.now();
        let completed = self
            .update_item(id, |b| {
                b.status = BackupStatus::Completed;
                b.progress = 100;
                b.size_bytes = Some(size);
                b.checksum = checksum;
                b.download_url = Some(url.clone());
                b.completed_at = Some(now);
            })
            .await;

        let Some(completed) = completed else {
            self.inner.deps.artifacts.revoke(&url).await;
            return;
        };

        tracing::info!(size_bytes = size, "Backup completed");
        self.announce(
            TemplateId::BackupCompleted,
            TemplateVars::new()
                .with("name", &completed.name)
                .with("size", payload::format_size(size)),
        )
        .await;
    }

    async fn fail(&self, id: BackupId, name: &str, error: &str) {
        let now = self.inner.deps.clock.now();
        self.update_item(id, |b| {
            b.status = BackupStatus::Failed;
            b.error = Some(error.to_string());
            b.completed_at = Some(now);
        })
        .await;
        tracing::error!(backup_id = %id, error, "Backup failed");
        self.announce(
            TemplateId::BackupFailed,
            TemplateVars::new().with("name", name).with("error", error),
        )
        .await;
    }

    async fn announce(&self, template: TemplateId, vars: TemplateVars) {
        if let Err(e) = self.inner.deps.notifications.notify(template, &vars).await {
            tracing::warn!(template = %template, error = %e, "Failed to announce backup");
        }
    }

    /// The payload of a completed backup.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound` for an unknown
    /// id, or `Conflict` when the backup has no live artifact.
    pub async fn download(
        &self,
        actor: &CurrentUser,
        id: BackupId,
    ) -> ServiceResult<(BackupItem, Artifact)> {
        require(actor, Permission::ManageBackups)?;
        let item = self.find(id).await.ok_or(ServiceError::NotFound("Backup"))?;
        let artifact = match &item.download_url {
            Some(url) if item.status == BackupStatus::Completed => {
                self.inner.deps.artifacts.get(url).await
            }
            _ => None,
        };
        let artifact = artifact.ok_or_else(|| {
            ServiceError::Conflict("Arquivo do backup não está disponível".into())
        })?;
        Ok((item, artifact))
    }

    /// Write a backup's sections back into the data store. Users are never
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound`/`Conflict` when
    /// the backup has no artifact, or `Validation` for an invalid file or a
    /// users-only backup.
    #[instrument(skip(self, actor, source), fields(actor = %actor.id))]
    pub async fn restore(
        &self,
        actor: &CurrentUser,
        source: RestoreSource,
    ) -> ServiceResult<RestoreSummary> {
        require(actor, Permission::ManageBackups)?;
        let bytes = match source {
            RestoreSource::Backup(id) => self.download(actor, id).await?.1.bytes.to_vec(),
            RestoreSource::Payload(bytes) => bytes,
        };

        let payload = BackupPayload::from_slice(&bytes)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        if payload.kind == BackupKind::Users {
            return Err(ServiceError::Validation(
                "backups de usuários não podem ser restaurados".into(),
            ));
        }

        let mut restored = payload.section_counts();
        restored.users = None;
        self.inner
            .deps
            .data
            .replace(DataSections {
                sales: payload.data.sales,
                resellers: payload.data.resellers,
                inventory: payload.data.inventory,
            })
            .await;

        tracing::info!(kind = payload.kind.as_str(), ?restored, "Backup restored");
        Ok(RestoreSummary {
            kind: payload.kind,
            restored,
        })
    }

    /// Delete a backup and revoke its download URL.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound` for an unknown
    /// id.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: BackupId) -> ServiceResult<()> {
        require(actor, Permission::ManageBackups)?;
        let removed = {
            let mut state = self.inner.state.write().await;
            let index = state
                .backups
                .iter()
                .position(|b| b.id == id)
                .ok_or(ServiceError::NotFound("Backup"))?;
            state.backups.remove(index)
        };
        if let Some(url) = &removed.download_url {
            self.inner.deps.artifacts.revoke(url).await;
        }
        self.persist().await?;
        tracing::info!(backup_id = %id, "Backup deleted");
        Ok(())
    }

    /// Delete finished backups older than `retention_days`, optionally only
    /// those produced by one schedule. Returns how many were removed.
    async fn remove_expired(
        &self,
        retention_days: i64,
        scope: RetentionScope,
    ) -> ServiceResult<usize> {
        let cutoff = self.inner.deps.clock.now() - chrono::Duration::days(retention_days);
        let expired: Vec<BackupItem> = {
            let mut state = self.inner.state.write().await;
            let (expired, kept) = std::mem::take(&mut state.backups)
                .into_iter()
                .partition(|b| {
                    b.status.is_terminal()
                        && b.created_at < cutoff
                        && scope.covers(b)
                });
            state.backups = kept;
            expired
        };

        if expired.is_empty() {
            return Ok(0);
        }
        for item in &expired {
            if let Some(url) = &item.download_url {
                self.inner.deps.artifacts.revoke(url).await;
            }
        }
        self.persist().await?;
        tracing::info!(removed = expired.len(), retention_days, "Expired backups removed");
        Ok(expired.len())
    }

    /// Delete finished backups older than `retention_days` and revoke their
    /// URLs. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, or `Validation` for a
    /// retention below one day.
    pub async fn cleanup_expired(
        &self,
        actor: &CurrentUser,
        retention_days: Option<i64>,
    ) -> ServiceResult<usize> {
        require(actor, Permission::ManageBackups)?;
        let retention_days = retention_days.unwrap_or(self.inner.retention_days);
        if retention_days < 1 {
            return Err(ServiceError::Validation(
                "a retenção deve ser de pelo menos 1 dia".into(),
            ));
        }
        self.remove_expired(retention_days, RetentionScope::All).await
    }

    // =========================================================================
    // Schedules
    // =========================================================================

    /// Every schedule.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`.
    pub async fn list_configs(&self, actor: &CurrentUser) -> ServiceResult<Vec<BackupConfig>> {
        require(actor, Permission::ManageBackups)?;
        Ok(self.inner.state.read().await.configs.clone())
    }

    /// Add a schedule. `next_run` is computed from now.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, or a validation error.
    #[instrument(skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn create_config(
        &self,
        actor: &CurrentUser,
        input: NewBackupConfig,
    ) -> ServiceResult<BackupConfig> {
        require(actor, Permission::ManageBackups)?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("o nome é obrigatório".into()));
        }
        let retention_days = input.retention_days.unwrap_or(self.inner.retention_days);
        validate_retention(retention_days)?;

        let config = BackupConfig {
            id: BackupConfigId::generate(),
            name,
            kind: input.kind,
            frequency: input.frequency,
            time: input.time,
            retention_days,
            enabled: input.enabled.unwrap_or(true),
            last_run: None,
            next_run: next_run(
                input.frequency,
                input.time,
                self.inner.deps.clock.now(),
                self.inner.timezone,
            ),
        };
        self.inner.state.write().await.configs.push(config.clone());
        self.persist().await?;
        tracing::info!(config_id = %config.id, next_run = %config.next_run, "Backup schedule created");
        Ok(config)
    }

    /// Update a schedule. Changing frequency or time recomputes `next_run`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound`, or a
    /// validation error.
    pub async fn update_config(
        &self,
        actor: &CurrentUser,
        id: BackupConfigId,
        update: BackupConfigUpdate,
    ) -> ServiceResult<BackupConfig> {
        require(actor, Permission::ManageBackups)?;
        if let Some(days) = update.retention_days {
            validate_retention(days)?;
        }
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(ServiceError::Validation("o nome é obrigatório".into())),
            other => other.map(str::to_string),
        };

        let now = self.inner.deps.clock.now();
        let updated = {
            let mut state = self.inner.state.write().await;
            let config = state
                .configs
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(ServiceError::NotFound("Agendamento"))?;
            let reschedule = update.frequency.is_some() || update.time.is_some();

            if let Some(name) = name {
                config.name = name;
            }
            if let Some(kind) = update.kind {
                config.kind = kind;
            }
            if let Some(frequency) = update.frequency {
                config.frequency = frequency;
            }
            if let Some(time) = update.time {
                config.time = time;
            }
            if let Some(days) = update.retention_days {
                config.retention_days = days;
            }
            if let Some(enabled) = update.enabled {
                config.enabled = enabled;
            }
            if reschedule {
                config.next_run = next_run(config.frequency, config.time, now, self.inner.timezone);
            }
            config.clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    /// Remove a schedule. Its past backups are kept.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageBackups`, `NotFound` for an unknown
    /// id.
    pub async fn delete_config(&self, actor: &CurrentUser, id: BackupConfigId) -> ServiceResult<()> {
        require(actor, Permission::ManageBackups)?;
        {
            let mut state = self.inner.state.write().await;
            let before = state.configs.len();
            state.configs.retain(|c| c.id != id);
            if state.configs.len() == before {
                return Err(ServiceError::NotFound("Agendamento"));
            }
        }
        self.persist().await
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    /// Trigger every enabled schedule that is due, then apply retention.
    /// Returns how many backups were started.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be persisted.
    pub async fn run_due(&self) -> ServiceResult<usize> {
        let now = self.inner.deps.clock.now();
        let due: Vec<BackupConfig> = {
            let mut state = self.inner.state.write().await;
            state
                .configs
                .iter_mut()
                .filter(|c| c.enabled && c.next_run <= now)
                .map(|c| {
                    c.last_run = Some(now);
                    c.next_run = next_run(c.frequency, c.time, now, self.inner.timezone);
                    c.clone()
                })
                .collect()
        };

        for config in &due {
            tracing::info!(config_id = %config.id, next_run = %config.next_run, "Running scheduled backup");
            self.start_backup(config.kind, Some(config.name.clone()), Some(config.id))
                .await?;
        }

        // Scheduled backups follow their own schedule's retention only.
        let configs = self.inner.state.read().await.configs.clone();
        for config in &configs {
            self.remove_expired(config.retention_days, RetentionScope::Config(config.id))
                .await?;
        }
        let owned = configs.iter().map(|c| c.id).collect();
        self.remove_expired(self.inner.retention_days, RetentionScope::Unscheduled(owned))
            .await?;

        if !due.is_empty() {
            self.persist().await?;
        }
        Ok(due.len())
    }

    /// Run [`BackupService::run_due`] on a fixed interval until shutdown.
    pub fn spawn_scheduler(&self) {
        let service = self.clone();
        let tasks = &self.inner.deps.tasks;
        let shutdown = tasks.shutdown_token();
        let every = self.inner.scheduler_interval;
        tasks.spawn("backup_scheduler", TaskKind::Periodic, async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if let Err(e) = service.run_due().await {
                    tracing::warn!(error = %e, "Backup scheduler tick failed");
                }
            }
        });
    }
}

fn validate_retention(days: i64) -> ServiceResult<()> {
    if days < 1 {
        return Err(ServiceError::Validation(
            "a retenção deve ser de pelo menos 1 dia".into(),
        ));
    }
    Ok(())
}
