//! Persistence for the "last seen" high-water mark.
//!
//! Supports a JSON file on the local filesystem and an in-memory store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{AppError, AppResult};

/// Seen-state store trait.
#[async_trait::async_trait]
pub trait SeenStateStore: Send + Sync {
    /// Load the persisted high-water mark, if one was ever written.
    async fn load(&self) -> AppResult<Option<DateTime<Utc>>>;

    /// Persist a new high-water mark.
    async fn save(&self, last_seen_at: DateTime<Utc>) -> AppResult<()>;
}

/// On-disk representation of the seen state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeenStateFile {
    last_seen_at: DateTime<Utc>,
}

/// Local filesystem seen-state store.
pub struct FileSeenStore {
    path: PathBuf,
}

impl FileSeenStore {
    /// Create a new file-backed store.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl SeenStateStore for FileSeenStore {
    async fn load(&self) -> AppResult<Option<DateTime<Utc>>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let state: SeenStateFile = serde_json::from_slice(&data)?;
        Ok(Some(state.last_seen_at))
    }

    async fn save(&self, last_seen_at: DateTime<Utc>) -> AppResult<()> {
        // Create parent directories if needed
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        let data = serde_json::to_vec_pretty(&SeenStateFile { last_seen_at })?;

        // Write-then-rename keeps the file whole
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to replace file: {e}")))?;

        tracing::debug!(path = %self.path.display(), %last_seen_at, "Persisted last seen mark");
        Ok(())
    }
}

/// In-memory seen-state store.
#[derive(Default)]
pub struct MemorySeenStore {
    value: RwLock<Option<DateTime<Utc>>>,
}

impl MemorySeenStore {
    /// Create a store holding an initial value.
    #[must_use]
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }
}

#[async_trait::async_trait]
impl SeenStateStore for MemorySeenStore {
    async fn load(&self) -> AppResult<Option<DateTime<Utc>>> {
        Ok(*self.value.read().await)
    }

    async fn save(&self, last_seen_at: DateTime<Utc>) -> AppResult<()> {
        *self.value.write().await = Some(last_seen_at);
        Ok(())
    }
}
