//! Transient downloadable artifacts.
//!
//! Completed backups are exposed through an artifact URL of the form
//! `blob:agencia-check/<uuid>`. The bytes live in memory until the URL is
//! revoked (backup deleted or expired) or the process exits; URLs do not
//! survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

const URL_PREFIX: &str = "blob:agencia-check/";

/// A stored artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Raw bytes.
    pub bytes: Arc<[u8]>,
    /// MIME type served with the download.
    pub content_type: &'static str,
    /// When the URL was created.
    pub created_at: DateTime<Utc>,
}

/// Registry of live artifact URLs. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    blobs: Arc<RwLock<HashMap<String, Artifact>>>,
}

impl ArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` and return a fresh URL for them.
    pub async fn create(&self, bytes: Vec<u8>, content_type: &'static str) -> String {
        let url = format!("{URL_PREFIX}{}", Uuid::new_v4());
        let artifact = Artifact {
            bytes: bytes.into(),
            content_type,
            created_at: Utc::now(),
        };
        self.blobs.write().await.insert(url.clone(), artifact);
        url
    }

    /// Look up a live URL.
    pub async fn get(&self, url: &str) -> Option<Artifact> {
        self.blobs.read().await.get(url).cloned()
    }

    /// Invalidate a URL. Returns whether it was live.
    pub async fn revoke(&self, url: &str) -> bool {
        let removed = self.blobs.write().await.remove(url).is_some();
        if removed {
            tracing::debug!(url, "Revoked artifact URL");
        }
        removed
    }

    /// Whether a URL is live.
    pub async fn contains(&self, url: &str) -> bool {
        self.blobs.read().await.contains_key(url)
    }

    /// Number of live URLs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether no URL is live.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}
