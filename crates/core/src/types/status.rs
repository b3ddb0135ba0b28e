//! Status and classification enums for the back-office entities.

use serde::{Deserialize, Serialize};

/// Back-office role with different permission levels.
///
/// See [`crate::permissions`] for the capabilities each role carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access, including user management and settings.
    Admin,
    /// Runs the store day to day. No user management.
    Manager,
    /// Registers sales and payments.
    Sales,
    /// Read-only access.
    Viewer,
}

impl UserRole {
    /// All roles, most privileged first.
    pub const ALL: [Self; 4] = [Self::Admin, Self::Manager, Self::Sales, Self::Viewer];

    /// Stable string form, as used in configuration and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Sales => "sales",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "sales" => Ok(Self::Sales),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Lifecycle of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Pending,
    Paid,
    Completed,
    Cancelled,
    Refunded,
}

impl SaleStatus {
    /// Whether the sale counts toward revenue.
    #[must_use]
    pub const fn is_revenue(&self) -> bool {
        matches!(self, Self::Paid | Self::Completed)
    }

    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Pix,
    CreditCard,
    DebitCard,
    Cash,
    Boleto,
}

/// Lifecycle of a backup: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl BackupStatus {
    /// Whether the backup has reached a final state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Which data sections a backup captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Every section.
    #[default]
    Full,
    Sales,
    Inventory,
    Resellers,
    Users,
}

impl BackupKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Sales => "sales",
            Self::Inventory => "inventory",
            Self::Resellers => "resellers",
            Self::Users => "users",
        }
    }

    /// Whether a backup of this kind carries `section`.
    #[must_use]
    pub fn includes(&self, section: Self) -> bool {
        *self == Self::Full || *self == section
    }
}

/// Recurrence of a scheduled backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl std::str::FromStr for BackupFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!("invalid backup frequency: {s}")),
        }
    }
}

/// Visual kind of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Business area a notification belongs to. Settings toggle delivery per
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Sales,
    Inventory,
    Payments,
    Resellers,
    Backup,
    System,
    Users,
}

impl NotificationCategory {
    /// Every category.
    pub const ALL: [Self; 7] = [
        Self::Sales,
        Self::Inventory,
        Self::Payments,
        Self::Resellers,
        Self::Backup,
        Self::System,
        Self::Users,
    ];
}

/// Urgency of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}
