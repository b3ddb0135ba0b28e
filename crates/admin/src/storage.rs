//! Key-value persistence for service state.
//!
//! # Keys
//!
//! - `agencia_check_notifications` - Notification list
//! - `agencia_check_notification_settings` - Notification settings
//! - `agencia_check_backups` - Backup records
//! - `agencia_check_backup_configs` - Backup schedules
//!
//! Values are plain JSON documents. With a data directory each key is a
//! `<key>.json` file, written to a temporary file and renamed into place.
//! Without one, values live in memory for the life of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage keys used by the services.
pub mod keys {
    /// Notification list.
    pub const NOTIFICATIONS: &str = "agencia_check_notifications";
    /// Notification settings.
    pub const NOTIFICATION_SETTINGS: &str = "agencia_check_notification_settings";
    /// Backup records.
    pub const BACKUPS: &str = "agencia_check_backups";
    /// Backup schedules.
    pub const BACKUP_CONFIGS: &str = "agencia_check_backup_configs";
}

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Stored value could not be (de)serialized.
    #[error("storage serialization error on {key}: {source}")]
    Serde {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
enum Backend {
    Memory(RwLock<HashMap<String, String>>),
    Files(PathBuf),
}

/// Handle to the persistence backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    backend: Arc<Backend>,
}

impl Storage {
    /// In-memory storage (nothing survives a restart).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory(RwLock::new(HashMap::new()))),
        }
    }

    /// File-backed storage rooted at `dir`. The directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn in_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                key: dir.display().to_string(),
                source,
            })?;
        Ok(Self {
            backend: Arc::new(Backend::Files(dir)),
        })
    }

    /// Whether values survive a restart.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        matches!(*self.backend, Backend::Files(_))
    }

    /// Load and deserialize the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be read or parsed.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let raw = match &*self.backend {
            Backend::Memory(map) => map.read().await.get(key).cloned(),
            Backend::Files(dir) => match tokio::fs::read_to_string(file_for(dir, key)).await {
                Ok(raw) => Some(raw),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(source) => {
                    return Err(StorageError::Io {
                        key: key.to_string(),
                        source,
                    });
                }
            },
        };

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|source| StorageError::Serde {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    /// Serialize and store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized or written.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serde {
            key: key.to_string(),
            source,
        })?;

        match &*self.backend {
            Backend::Memory(map) => {
                map.write().await.insert(key.to_string(), raw);
            }
            Backend::Files(dir) => {
                let target = file_for(dir, key);
                let tmp = target.with_extension("json.tmp");
                let io_err = |source| StorageError::Io {
                    key: key.to_string(),
                    source,
                };
                tokio::fs::write(&tmp, raw).await.map_err(io_err)?;
                tokio::fs::rename(&tmp, &target).await.map_err(io_err)?;
            }
        }

        tracing::debug!(key, "Persisted state");
        Ok(())
    }

    /// Remove the value under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match &*self.backend {
            Backend::Memory(map) => {
                map.write().await.remove(key);
            }
            Backend::Files(dir) => match tokio::fs::remove_file(file_for(dir, key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StorageError::Io {
                        key: key.to_string(),
                        source,
                    });
                }
            },
        }
        Ok(())
    }
}

fn file_for(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let storage = Storage::in_memory();
        assert!(storage.load::<Vec<u32>>("k").await.unwrap().is_none());

        storage.save("k", &vec![1_u32, 2, 3]).await.unwrap();
        assert_eq!(storage.load::<Vec<u32>>("k").await.unwrap(), Some(vec![1, 2, 3]));

        storage.remove("k").await.unwrap();
        assert!(storage.load::<Vec<u32>>("k").await.unwrap().is_none());
        assert!(!storage.is_durable());
    }

    #[tokio::test]
    async fn test_file_roundtrip_survives_new_handle() {
        let dir = std::env::temp_dir().join(format!("agencia-storage-{}", uuid::Uuid::new_v4()));
        let storage = Storage::in_dir(&dir).await.unwrap();
        storage.save(keys::BACKUPS, &vec!["a", "b"]).await.unwrap();

        let reopened = Storage::in_dir(&dir).await.unwrap();
        let loaded: Option<Vec<String>> = reopened.load(keys::BACKUPS).await.unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(reopened.is_durable());

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_value_is_an_error() {
        let storage = Storage::in_memory();
        storage.save("k", "not a list").await.unwrap();
        let result = storage.load::<Vec<u32>>("k").await;
        assert!(matches!(result, Err(StorageError::Serde { .. })));
    }
}
