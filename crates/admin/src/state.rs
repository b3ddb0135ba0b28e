//! Application state shared across handlers.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::artifacts::ArtifactStore;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{AppConfig, BootstrapAdmin, ServiceSettings};
use crate::services::notifications::FeedStatus;
use crate::services::{
    AnalyticsService, BackupDeps, BackupService, DataStore, NotificationService, RealtimeFeed,
    ServiceResult, SimulatedEventSource, UserService,
};
use crate::storage::Storage;
use crate::tasks::BackgroundTasks;

type Feed = RealtimeFeed<SimulatedEventSource>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    base_url: String,
    settings: ServiceSettings,
    clock: SharedClock,
    tasks: BackgroundTasks,
    storage: Storage,
    artifacts: ArtifactStore,
    users: UserService,
    data: DataStore,
    analytics: AnalyticsService,
    notifications: NotificationService,
    backups: BackupService,
    /// Taken by [`AppState::start_background`].
    feed: Mutex<Option<Feed>>,
    feed_status: watch::Receiver<FeedStatus>,
}

/// Everything needed to assemble the services.
#[derive(Clone)]
pub struct StateParts {
    pub base_url: String,
    pub storage: Storage,
    pub clock: SharedClock,
    pub bootstrap_admin: BootstrapAdmin,
    pub seed_demo_users: bool,
    pub seed_demo_data: bool,
    pub settings: ServiceSettings,
}

impl AppState {
    /// Build the state from loaded configuration.
    ///
    /// Uses the system clock, file storage when a data directory is
    /// configured, and seeds the demo collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or persisted state cannot be
    /// read, or the bootstrap admin cannot be created.
    pub async fn from_config(config: &AppConfig) -> ServiceResult<Self> {
        let storage = match &config.data_dir {
            Some(dir) => Storage::in_dir(dir).await?,
            None => Storage::in_memory(),
        };
        Self::build(StateParts {
            base_url: config.base_url.clone(),
            storage,
            clock: Arc::new(SystemClock),
            bootstrap_admin: config.bootstrap_admin.clone(),
            seed_demo_users: config.seed_demo_users,
            seed_demo_data: true,
            settings: config.services.clone(),
        })
        .await
    }

    /// Assemble the services. Nothing runs in the background until
    /// [`AppState::start_background`].
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state cannot be read or the bootstrap
    /// admin cannot be created.
    pub async fn build(parts: StateParts) -> ServiceResult<Self> {
        let StateParts {
            base_url,
            storage,
            clock,
            bootstrap_admin,
            seed_demo_users,
            seed_demo_data,
            settings,
        } = parts;

        let tasks = BackgroundTasks::new();
        let artifacts = ArtifactStore::new();

        let notifications =
            NotificationService::load(storage.clone(), clock.clone(), &settings).await?;
        let users = UserService::seeded(clock.clone(), &bootstrap_admin, seed_demo_users).await?;
        let data = DataStore::new(clock.clone()).with_notifications(notifications.clone());
        if seed_demo_data {
            data.seed_demo_data().await;
        }
        let analytics = AnalyticsService::new(data.clone(), clock.clone(), &settings);
        let backups = BackupService::load(
            BackupDeps {
                storage: storage.clone(),
                artifacts: artifacts.clone(),
                data: data.clone(),
                users: users.clone(),
                notifications: notifications.clone(),
                clock: clock.clone(),
                tasks: tasks.clone(),
            },
            &settings,
        )
        .await?;

        let (feed, feed_status) = if settings.feed_enabled {
            let feed = RealtimeFeed::new(
                SimulatedEventSource::new(settings.feed_tick, settings.feed_event_probability),
                notifications.clone(),
                settings.feed_reconnect_base,
                settings.feed_max_reconnect_attempts,
            );
            let status = feed.status();
            (Some(feed), status)
        } else {
            (None, watch::channel(FeedStatus::Disconnected).1)
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                base_url,
                settings,
                clock,
                tasks,
                storage,
                artifacts,
                users,
                data,
                analytics,
                notifications,
                backups,
                feed: Mutex::new(feed),
                feed_status,
            }),
        })
    }

    /// Start the backup scheduler, the quiet-hours flusher and the real-time
    /// feed. Calling it again does not start a second feed.
    pub fn start_background(&self) {
        self.inner.backups.spawn_scheduler();
        self.inner
            .notifications
            .spawn_queue_flusher(&self.inner.tasks, self.inner.settings.backup_scheduler_interval);

        let feed = self
            .inner
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(feed) = feed {
            feed.spawn(&self.inner.tasks);
        }
    }

    /// Get the public base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether cookies must be marked secure.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.inner.base_url.starts_with("https://")
    }

    /// Get the service tunables.
    #[must_use]
    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    /// Get the clock.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    /// Get the background task registry.
    #[must_use]
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    /// Get the persistence backend.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Get the artifact store.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.inner.artifacts
    }

    /// Get the user service.
    #[must_use]
    pub fn users(&self) -> &UserService {
        &self.inner.users
    }

    /// Get the data store.
    #[must_use]
    pub fn data(&self) -> &DataStore {
        &self.inner.data
    }

    /// Get the analytics service.
    #[must_use]
    pub fn analytics(&self) -> &AnalyticsService {
        &self.inner.analytics
    }

    /// Get the notification service.
    #[must_use]
    pub fn notifications(&self) -> &NotificationService {
        &self.inner.notifications
    }

    /// Get the backup service.
    #[must_use]
    pub fn backups(&self) -> &BackupService {
        &self.inner.backups
    }

    /// Current real-time feed status.
    #[must_use]
    pub fn feed_status(&self) -> FeedStatus {
        *self.inner.feed_status.borrow()
    }
}
