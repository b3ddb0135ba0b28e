//! Backup records and schedules.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use agencia_check_core::{BackupConfigId, BackupFrequency, BackupId, BackupKind, BackupStatus};

/// A backup and its progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupItem {
    pub id: BackupId,
    pub name: String,
    pub kind: BackupKind,
    pub status: BackupStatus,
    /// 0-100.
    pub progress: u8,
    pub size_bytes: Option<u64>,
    /// SHA-256 of the payload, hex encoded.
    pub checksum: Option<String>,
    /// Artifact URL; `None` until completed and after revocation.
    pub download_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Schedule that triggered this backup, if any.
    pub config_id: Option<BackupConfigId>,
}

/// A recurring backup schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub id: BackupConfigId,
    pub name: String,
    pub kind: BackupKind,
    pub frequency: BackupFrequency,
    /// Local time of day.
    pub time: NaiveTime,
    pub retention_days: i64,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
}

/// Input for creating a schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBackupConfig {
    pub name: String,
    #[serde(default)]
    pub kind: BackupKind,
    pub frequency: BackupFrequency,
    pub time: NaiveTime,
    pub retention_days: Option<i64>,
    pub enabled: Option<bool>,
}

/// Partial update of a schedule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupConfigUpdate {
    pub name: Option<String>,
    pub kind: Option<BackupKind>,
    pub frequency: Option<BackupFrequency>,
    pub time: Option<NaiveTime>,
    pub retention_days: Option<i64>,
    pub enabled: Option<bool>,
}

/// Input for a manual backup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupRequest {
    #[serde(default)]
    pub kind: BackupKind,
    pub name: Option<String>,
}
