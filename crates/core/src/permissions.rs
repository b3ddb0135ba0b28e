//! Role-based permission model.
//!
//! Every gated operation names one [`Permission`]. Roles map to a fixed set
//! of permissions; there is no per-user override. The string keys returned by
//! [`permission_keys`] are what gets cached on a user record and sent to
//! clients.

use serde::{Deserialize, Serialize};

use crate::UserRole;

/// A single capability in the back-office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    ViewSales,
    ManageSales,
    ViewResellers,
    ManageResellers,
    ViewInventory,
    ManageInventory,
    ManagePayments,
    ViewAnalytics,
    ManageNotifications,
    ManageBackups,
    ManageUsers,
    ManageSettings,
}

impl Permission {
    /// Every permission, in display order.
    pub const ALL: [Self; 13] = [
        Self::ViewDashboard,
        Self::ViewSales,
        Self::ManageSales,
        Self::ViewResellers,
        Self::ManageResellers,
        Self::ViewInventory,
        Self::ManageInventory,
        Self::ManagePayments,
        Self::ViewAnalytics,
        Self::ManageNotifications,
        Self::ManageBackups,
        Self::ManageUsers,
        Self::ManageSettings,
    ];

    /// Stable `area:action` key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::ViewDashboard => "dashboard:view",
            Self::ViewSales => "sales:view",
            Self::ManageSales => "sales:manage",
            Self::ViewResellers => "resellers:view",
            Self::ManageResellers => "resellers:manage",
            Self::ViewInventory => "inventory:view",
            Self::ManageInventory => "inventory:manage",
            Self::ManagePayments => "payments:manage",
            Self::ViewAnalytics => "analytics:view",
            Self::ManageNotifications => "notifications:manage",
            Self::ManageBackups => "backups:manage",
            Self::ManageUsers => "users:manage",
            Self::ManageSettings => "settings:manage",
        }
    }

    /// Whether this is a read-only capability.
    #[must_use]
    pub const fn is_view(&self) -> bool {
        matches!(
            self,
            Self::ViewDashboard
                | Self::ViewSales
                | Self::ViewResellers
                | Self::ViewInventory
                | Self::ViewAnalytics
        )
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

const MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewSales,
    Permission::ManageSales,
    Permission::ViewResellers,
    Permission::ManageResellers,
    Permission::ViewInventory,
    Permission::ManageInventory,
    Permission::ManagePayments,
    Permission::ViewAnalytics,
    Permission::ManageNotifications,
    Permission::ManageBackups,
];

const SALES_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewSales,
    Permission::ManageSales,
    Permission::ViewResellers,
    Permission::ViewInventory,
    Permission::ManagePayments,
];

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::ViewDashboard,
    Permission::ViewSales,
    Permission::ViewResellers,
    Permission::ViewInventory,
    Permission::ViewAnalytics,
];

/// The permissions a role carries.
#[must_use]
pub const fn permissions_for(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::Admin => &Permission::ALL,
        UserRole::Manager => MANAGER_PERMISSIONS,
        UserRole::Sales => SALES_PERMISSIONS,
        UserRole::Viewer => VIEWER_PERMISSIONS,
    }
}

/// String keys for a role's permissions, as cached on a user record.
#[must_use]
pub fn permission_keys(role: UserRole) -> Vec<String> {
    permissions_for(role)
        .iter()
        .map(|p| p.key().to_string())
        .collect()
}

impl UserRole {
    /// Whether this role carries `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        permissions_for(*self).contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        for permission in Permission::ALL {
            assert!(UserRole::Admin.has_permission(permission), "{permission}");
        }
    }

    #[test]
    fn test_only_admin_manages_users_and_settings() {
        for role in [UserRole::Manager, UserRole::Sales, UserRole::Viewer] {
            assert!(!role.has_permission(Permission::ManageUsers));
            assert!(!role.has_permission(Permission::ManageSettings));
        }
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert!(permissions_for(UserRole::Viewer).iter().all(Permission::is_view));
    }

    #[test]
    fn test_sales_cannot_touch_backups_or_analytics() {
        assert!(UserRole::Sales.has_permission(Permission::ManageSales));
        assert!(!UserRole::Sales.has_permission(Permission::ManageBackups));
        assert!(!UserRole::Sales.has_permission(Permission::ViewAnalytics));
    }

    #[test]
    fn test_permission_keys_are_unique() {
        let keys = permission_keys(UserRole::Admin);
        let mut deduped = keys.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
        assert!(keys.contains(&"users:manage".to_string()));
    }
}
