//! Notification records and delivery settings.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use agencia_check_core::{
    NotificationCategory, NotificationId, NotificationKind, NotificationPriority,
};

/// A notification shown to back-office users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub read: bool,
    /// Milliseconds after which the client may dismiss it.
    pub auto_close: Option<u32>,
    /// Persistent notifications are not auto-dismissed.
    pub persistent: bool,
    pub action_url: Option<String>,
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Per-channel delivery toggles for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToggles {
    pub in_app: bool,
    pub email: bool,
    pub push: bool,
    pub sound: bool,
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            in_app: true,
            email: false,
            push: false,
            sound: true,
        }
    }
}

/// Daily window during which notifications are queued instead of delivered.
///
/// `start > end` means the window wraps midnight (e.g. 22:00-07:00).
/// `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Whether `time` (local) falls inside the window.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled || self.start == self.end {
            return false;
        }
        if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch.
    pub enabled: bool,
    /// Toggles per category. Missing categories use the defaults.
    pub categories: BTreeMap<NotificationCategory, ChannelToggles>,
    pub quiet_hours: QuietHours,
    pub sound_enabled: bool,
}

impl NotificationSettings {
    /// Toggles for `category`.
    #[must_use]
    pub fn channels(&self, category: NotificationCategory) -> ChannelToggles {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: NotificationCategory::ALL
                .into_iter()
                .map(|category| (category, ChannelToggles::default()))
                .collect(),
            quiet_hours: QuietHours::default(),
            sound_enabled: true,
        }
    }
}

/// Query over the notification list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    pub category: Option<NotificationCategory>,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<usize>,
}

impl NotificationFilter {
    /// Whether `notification` passes the filter (ignoring `limit`).
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        self.category.is_none_or(|c| c == notification.category)
            && (!self.unread_only || !notification.read)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_quiet_hours_wrapping_window() {
        let quiet = QuietHours {
            enabled: true,
            start: at(22, 0),
            end: at(7, 0),
        };
        assert!(quiet.contains(at(23, 30)));
        assert!(quiet.contains(at(0, 0)));
        assert!(quiet.contains(at(6, 59)));
        assert!(!quiet.contains(at(7, 0)));
        assert!(!quiet.contains(at(12, 0)));
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let quiet = QuietHours {
            enabled: true,
            start: at(12, 0),
            end: at(14, 0),
        };
        assert!(quiet.contains(at(12, 0)));
        assert!(!quiet.contains(at(14, 0)));
        assert!(!quiet.contains(at(9, 0)));
    }

    #[test]
    fn test_quiet_hours_disabled_or_empty() {
        let mut quiet = QuietHours {
            enabled: false,
            start: at(0, 0),
            end: at(23, 59),
        };
        assert!(!quiet.contains(at(12, 0)));

        quiet.enabled = true;
        quiet.end = quiet.start;
        assert!(!quiet.contains(at(0, 0)));
    }

    #[test]
    fn test_default_settings_cover_every_category() {
        let settings = NotificationSettings::default();
        for category in NotificationCategory::ALL {
            assert!(settings.channels(category).in_app);
        }
    }
}
