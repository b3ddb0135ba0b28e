//! Notification pipeline.
//!
//! Events are rendered through [`templates`] and then pass the delivery
//! policy:
//!
//! 1. Globally disabled, or `in_app` off for the category: dropped.
//! 2. Inside quiet hours: queued until [`NotificationService::process_queue`].
//! 3. Otherwise: inserted at the head of the list and broadcast to
//!    subscribers.
//!
//! The list and settings are persisted through [`Storage`] after every
//! change.

pub mod feed;
pub mod templates;

pub use feed::{
    EventSource, FeedError, FeedEvent, FeedStatus, RealtimeFeed, ScriptedEventSource,
    SimulatedEventSource,
};
pub use templates::{Template, TemplateId, TemplateVars, render};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::instrument;

use agencia_check_core::{NotificationId, Permission};

use crate::clock::SharedClock;
use crate::config::ServiceSettings;
use crate::models::{CurrentUser, Notification, NotificationFilter, NotificationSettings};
use crate::storage::{Storage, keys};
use crate::tasks::{BackgroundTasks, TaskKind};

use super::error::{ServiceError, ServiceResult, require};

const BROADCAST_CAPACITY: usize = 256;

/// Outcome of submitting a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Suppressed by settings.
    Dropped,
    /// Held until quiet hours end.
    Queued,
    /// Added to the list and broadcast.
    Delivered,
}

#[derive(Debug, Default)]
struct State {
    /// Newest first.
    list: VecDeque<Notification>,
    settings: NotificationSettings,
    /// Arrival order.
    queue: VecDeque<Notification>,
}

struct Inner {
    state: RwLock<State>,
    persist_lock: Mutex<()>,
    storage: Storage,
    clock: SharedClock,
    timezone: FixedOffset,
    capacity: usize,
    queue_capacity: usize,
    sender: broadcast::Sender<Notification>,
}

/// Handle to the notification pipeline. Cheap to clone.
#[derive(Clone)]
pub struct NotificationService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("capacity", &self.inner.capacity)
            .field("queue_capacity", &self.inner.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl NotificationService {
    /// Build the service, restoring the list and settings from `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state exists but cannot be read.
    pub async fn load(
        storage: Storage,
        clock: SharedClock,
        settings: &ServiceSettings,
    ) -> ServiceResult<Self> {
        let mut list: VecDeque<Notification> = storage
            .load::<Vec<Notification>>(keys::NOTIFICATIONS)
            .await?
            .unwrap_or_default()
            .into();
        list.truncate(settings.notification_capacity);
        let notification_settings = storage
            .load::<NotificationSettings>(keys::NOTIFICATION_SETTINGS)
            .await?
            .unwrap_or_default();

        tracing::info!(restored = list.len(), "Notification service ready");

        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    list,
                    settings: notification_settings,
                    queue: VecDeque::new(),
                }),
                persist_lock: Mutex::new(()),
                storage,
                clock,
                timezone: settings.timezone,
                capacity: settings.notification_capacity,
                queue_capacity: settings.notification_queue_capacity,
                sender,
            }),
        })
    }

    /// Receive every delivered notification from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.sender.subscribe()
    }

    async fn persist(&self) -> ServiceResult<()> {
        let _guard = self.inner.persist_lock.lock().await;
        let (list, settings) = {
            let state = self.inner.state.read().await;
            (
                state.list.iter().cloned().collect::<Vec<_>>(),
                state.settings.clone(),
            )
        };
        self.inner.storage.save(keys::NOTIFICATIONS, &list).await?;
        self.inner
            .storage
            .save(keys::NOTIFICATION_SETTINGS, &settings)
            .await?;
        Ok(())
    }

    fn in_quiet_hours(&self, settings: &NotificationSettings) -> bool {
        let local = self
            .inner
            .clock
            .now()
            .with_timezone(&self.inner.timezone)
            .time();
        settings.quiet_hours.contains(local)
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Render `template` with `vars` and submit it.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated list cannot be persisted.
    pub async fn notify(&self, template: TemplateId, vars: &TemplateVars) -> ServiceResult<Delivery> {
        let blueprint = template.template();
        let notification = Notification {
            id: NotificationId::generate(),
            kind: blueprint.kind,
            category: blueprint.category,
            priority: blueprint.priority,
            title: render(blueprint.title, vars),
            message: render(blueprint.message, vars),
            read: false,
            auto_close: blueprint.auto_close,
            persistent: blueprint.persistent,
            action_url: blueprint.action_url.map(str::to_string),
            data: vars.to_json(),
            created_at: self.inner.clock.now(),
        };
        self.submit(notification).await
    }

    /// Apply the delivery policy to a ready-made notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated list cannot be persisted.
    #[instrument(skip_all, fields(category = ?notification.category, title = %notification.title))]
    pub async fn submit(&self, notification: Notification) -> ServiceResult<Delivery> {
        let delivery = {
            let mut state = self.inner.state.write().await;
            let channels = state.settings.channels(notification.category);

            if !state.settings.enabled || !channels.in_app {
                tracing::debug!("Notification dropped by settings");
                return Ok(Delivery::Dropped);
            }

            if self.in_quiet_hours(&state.settings) {
                if state.queue.len() >= self.inner.queue_capacity {
                    state.queue.pop_front();
                    tracing::warn!("Quiet-hours queue full, dropped oldest");
                }
                state.queue.push_back(notification);
                tracing::debug!(queued = state.queue.len(), "Notification queued for quiet hours");
                return Ok(Delivery::Queued);
            }

            self.insert(&mut state, notification);
            Delivery::Delivered
        };

        self.persist().await?;
        Ok(delivery)
    }

    fn insert(&self, state: &mut State, notification: Notification) {
        state.list.push_front(notification.clone());
        state.list.truncate(self.inner.capacity);
        // No subscribers is fine.
        let _ = self.inner.sender.send(notification);
    }

    /// Deliver every queued notification in arrival order. Returns how many
    /// were flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated list cannot be persisted.
    pub async fn process_queue(&self) -> ServiceResult<usize> {
        let flushed = {
            let mut state = self.inner.state.write().await;
            let queued: Vec<_> = state.queue.drain(..).collect();
            let count = queued.len();
            for notification in queued {
                self.insert(&mut state, notification);
            }
            count
        };

        if flushed > 0 {
            tracing::info!(flushed, "Flushed quiet-hours queue");
            self.persist().await?;
        }
        Ok(flushed)
    }

    /// Number of notifications waiting for quiet hours to end.
    pub async fn queued_count(&self) -> usize {
        self.inner.state.read().await.queue.len()
    }

    /// Periodically flush the queue once quiet hours are over.
    pub fn spawn_queue_flusher(&self, tasks: &BackgroundTasks, every: Duration) {
        let service = self.clone();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("notification_queue_flusher", TaskKind::Periodic, async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let ready = {
                    let state = service.inner.state.read().await;
                    !state.queue.is_empty() && !service.in_quiet_hours(&state.settings)
                };
                if ready && let Err(e) = service.process_queue().await {
                    tracing::warn!(error = %e, "Failed to flush notification queue");
                }
            }
        });
    }

    // =========================================================================
    // List management
    // =========================================================================

    /// Notifications matching `filter`, newest first.
    pub async fn list(&self, filter: &NotificationFilter) -> Vec<Notification> {
        let state = self.inner.state.read().await;
        state
            .list
            .iter()
            .filter(|n| filter.matches(n))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self) -> usize {
        self.inner
            .state
            .read()
            .await
            .list
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn mark_as_read(&self, id: NotificationId) -> ServiceResult<()> {
        {
            let mut state = self.inner.state.write().await;
            let notification = state
                .list
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(ServiceError::NotFound("Notificação"))?;
            notification.read = true;
        }
        self.persist().await
    }

    /// Mark every notification read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be persisted.
    pub async fn mark_all_as_read(&self) -> ServiceResult<usize> {
        let changed = {
            let mut state = self.inner.state.write().await;
            let mut changed = 0;
            for notification in state.list.iter_mut().filter(|n| !n.read) {
                notification.read = true;
                changed += 1;
            }
            changed
        };
        self.persist().await?;
        Ok(changed)
    }

    /// Delete one notification.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn delete(&self, id: NotificationId) -> ServiceResult<()> {
        {
            let mut state = self.inner.state.write().await;
            let before = state.list.len();
            state.list.retain(|n| n.id != id);
            if state.list.len() == before {
                return Err(ServiceError::NotFound("Notificação"));
            }
        }
        self.persist().await
    }

    /// Delete every notification. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageNotifications`.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub async fn clear_all(&self, actor: &CurrentUser) -> ServiceResult<usize> {
        require(actor, Permission::ManageNotifications)?;
        let removed = {
            let mut state = self.inner.state.write().await;
            let removed = state.list.len();
            state.list.clear();
            removed
        };
        tracing::info!(removed, "Cleared notifications");
        self.persist().await?;
        Ok(removed)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Current settings.
    pub async fn settings(&self) -> NotificationSettings {
        self.inner.state.read().await.settings.clone()
    }

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageNotifications`.
    #[instrument(skip_all, fields(actor = %actor.id, enabled = settings.enabled))]
    pub async fn update_settings(
        &self,
        actor: &CurrentUser,
        settings: NotificationSettings,
    ) -> ServiceResult<NotificationSettings> {
        require(actor, Permission::ManageNotifications)?;
        self.inner.state.write().await.settings = settings.clone();
        tracing::info!("Notification settings updated");
        self.persist().await?;
        Ok(settings)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::QuietHours;
    use agencia_check_core::{Email, NotificationCategory, UserId, UserRole};
    use chrono::{NaiveTime, TimeZone, Utc};

    fn admin() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("admin@agencia.com.br").unwrap(),
            name: "Admin".into(),
            role: UserRole::Admin,
        }
    }

    /// 15:00 UTC is 12:00 at -03:00.
    fn noon() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()
    }

    async fn service_at(clock: Arc<FixedClock>, capacity: usize) -> NotificationService {
        let settings = ServiceSettings {
            notification_capacity: capacity,
            notification_queue_capacity: 3,
            ..ServiceSettings::default()
        };
        NotificationService::load(Storage::in_memory(), clock, &settings)
            .await
            .unwrap()
    }

    fn sale_vars(id: u32) -> TemplateVars {
        TemplateVars::new().with("sale_id", id).with("value", "R$ 10,00")
    }

    fn quiet_noon() -> NotificationSettings {
        NotificationSettings {
            quiet_hours: QuietHours {
                enabled: true,
                start: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            },
            ..NotificationSettings::default()
        }
    }

    #[tokio::test]
    async fn test_delivered_notification_is_rendered_and_broadcast() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        let mut rx = service.subscribe();

        let delivery = service
            .notify(TemplateId::SaleCreated, &sale_vars(42))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Delivered);

        let received = rx.recv().await.unwrap();
        assert!(received.message.contains("#42"));
        assert_eq!(service.unread_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_is_capped_newest_first() {
        let service = service_at(FixedClock::shared(noon()), 5).await;
        for id in 0..8 {
            service.notify(TemplateId::SaleCreated, &sale_vars(id)).await.unwrap();
        }
        let list = service.list(&NotificationFilter::default()).await;
        assert_eq!(list.len(), 5);
        assert!(list[0].message.contains("#7"));
        assert!(list[4].message.contains("#3"));
    }

    #[tokio::test]
    async fn test_disabled_category_drops() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        let mut settings = NotificationSettings::default();
        settings
            .categories
            .entry(NotificationCategory::Sales)
            .or_default()
            .in_app = false;
        service.update_settings(&admin(), settings).await.unwrap();

        let delivery = service
            .notify(TemplateId::SaleCreated, &sale_vars(1))
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Dropped);
        assert_eq!(service.unread_count().await, 0);

        let other = service
            .notify(TemplateId::ResellerRegistered, &TemplateVars::new().with("name", "Ana"))
            .await
            .unwrap();
        assert_eq!(other, Delivery::Delivered);
    }

    #[tokio::test]
    async fn test_globally_disabled_drops() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        let settings = NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        };
        service.update_settings(&admin(), settings).await.unwrap();
        let delivery = service
            .notify(TemplateId::SystemAlert, &TemplateVars::new())
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[tokio::test]
    async fn test_quiet_hours_queue_then_flush_in_order() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        service.update_settings(&admin(), quiet_noon()).await.unwrap();

        for id in 1..=2 {
            let delivery = service.notify(TemplateId::SaleCreated, &sale_vars(id)).await.unwrap();
            assert_eq!(delivery, Delivery::Queued);
        }
        assert!(service.list(&NotificationFilter::default()).await.is_empty());
        assert_eq!(service.queued_count().await, 2);

        assert_eq!(service.process_queue().await.unwrap(), 2);
        let list = service.list(&NotificationFilter::default()).await;
        assert!(list[0].message.contains("#2"));
        assert!(list[1].message.contains("#1"));
        assert_eq!(service.queued_count().await, 0);
    }

    #[tokio::test]
    async fn test_queue_drops_oldest_when_full() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        service.update_settings(&admin(), quiet_noon()).await.unwrap();
        for id in 1..=5 {
            service.notify(TemplateId::SaleCreated, &sale_vars(id)).await.unwrap();
        }
        assert_eq!(service.queued_count().await, 3);
        service.process_queue().await.unwrap();
        let list = service.list(&NotificationFilter::default()).await;
        assert!(list.last().unwrap().message.contains("#3"));
    }

    #[tokio::test]
    async fn test_mark_all_as_read() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        for id in 0..3 {
            service.notify(TemplateId::SaleCreated, &sale_vars(id)).await.unwrap();
        }
        let first = service.list(&NotificationFilter::default()).await[0].id;
        service.mark_as_read(first).await.unwrap();
        assert_eq!(service.unread_count().await, 2);

        assert_eq!(service.mark_all_as_read().await.unwrap(), 2);
        assert_eq!(service.unread_count().await, 0);
        assert!(
            service
                .list(&NotificationFilter::default())
                .await
                .iter()
                .all(|n| n.read)
        );
    }

    #[tokio::test]
    async fn test_filter_delete_and_clear() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        service.notify(TemplateId::SaleCreated, &sale_vars(1)).await.unwrap();
        service
            .notify(TemplateId::LowStock, &TemplateVars::new().with("product", "Kit"))
            .await
            .unwrap();

        let filter = NotificationFilter {
            category: Some(NotificationCategory::Inventory),
            ..NotificationFilter::default()
        };
        let inventory = service.list(&filter).await;
        assert_eq!(inventory.len(), 1);

        service.delete(inventory[0].id).await.unwrap();
        assert!(matches!(
            service.delete(inventory[0].id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(service.clear_all(&admin()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let storage = Storage::in_memory();
        let clock = FixedClock::shared(noon());
        let settings = ServiceSettings::default();
        let service = NotificationService::load(storage.clone(), clock.clone(), &settings)
            .await
            .unwrap();
        service.notify(TemplateId::SaleCreated, &sale_vars(9)).await.unwrap();
        service.update_settings(&admin(), quiet_noon()).await.unwrap();

        let reloaded = NotificationService::load(storage, clock, &settings).await.unwrap();
        assert_eq!(reloaded.unread_count().await, 1);
        assert!(reloaded.settings().await.quiet_hours.enabled);
    }

    #[tokio::test]
    async fn test_settings_require_permission() {
        let service = service_at(FixedClock::shared(noon()), 1000).await;
        let viewer = CurrentUser {
            role: UserRole::Viewer,
            ..admin()
        };
        let result = service
            .update_settings(&viewer, NotificationSettings::default())
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Forbidden(Permission::ManageNotifications))
        ));
    }
}
