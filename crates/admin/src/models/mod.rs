//! Domain models for the back-office.

pub mod backup;
pub mod inventory;
pub mod notification;
pub mod sale;
pub mod session;
pub mod user;

pub use backup::{BackupConfig, BackupConfigUpdate, BackupItem, BackupRequest, NewBackupConfig};
pub use inventory::{InventoryItem, NewInventoryItem, StockAdjustment};
pub use notification::{
    ChannelToggles, Notification, NotificationFilter, NotificationSettings, QuietHours,
};
pub use sale::{NewReseller, NewSale, Reseller, ResellerUpdate, Sale, SaleUpdate};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{NewUser, User, UserUpdate, UserView};
