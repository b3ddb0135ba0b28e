//! Business logic services for the back-office.
//!
//! # Services
//!
//! - `users` - User directory, password hashing and login
//! - `data_store` - Sales, resellers and inventory collections
//! - `analytics` - Dashboard metrics with a memoizing cache
//! - `notifications` - Templated notifications, quiet hours and the real-time feed
//! - `backups` - Backup jobs, restore and the recurring scheduler
//!
//! Every permission-gated method takes the acting [`CurrentUser`] and fails
//! with [`ServiceError::Forbidden`] before touching any state.
//!
//! [`CurrentUser`]: crate::models::CurrentUser

pub mod analytics;
pub mod backups;
pub mod data_store;
pub mod error;
pub mod notifications;
pub mod users;

pub use analytics::{AnalyticsFilters, AnalyticsService, DashboardMetrics, calculate_percent_change};
pub use backups::{BackupDeps, BackupService, RestoreSource, RestoreSummary};
pub use data_store::{DataSections, DataSnapshot, DataStore};
pub use error::{ServiceError, ServiceResult};
pub use notifications::{
    Delivery, FeedStatus, NotificationService, RealtimeFeed, SimulatedEventSource, TemplateId,
    TemplateVars,
};
pub use users::{UserService, hash_password, verify_password};
