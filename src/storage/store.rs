//! Snapshot stores

use crate::error::{MatchError, Result};
use crate::storage::document::StateDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Whole-document load and save
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the stored document. `Ok(None)` means nothing has been saved yet;
    /// an unreadable document is a `Persistence` error.
    async fn load(&self) -> Result<Option<StateDocument>>;

    /// Replace the stored document
    async fn save(&self, document: &StateDocument) -> Result<()>;
}

/// JSON file on local disk, written atomically through a temp file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, action: &str, err: impl std::fmt::Display) -> MatchError {
        MatchError::Persistence {
            message: format!("failed to {} {}: {}", action, self.path.display(), err),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Option<StateDocument>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.persistence_error("read", e).into()),
        };

        let document = StateDocument::from_json(&raw)?;
        debug!("Loaded {} bytes from {}", raw.len(), self.path.display());
        Ok(Some(document))
    }

    async fn save(&self, document: &StateDocument) -> Result<()> {
        let json = document.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persistence_error("create directory for", e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| self.persistence_error("write", e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.persistence_error("replace", e))?;

        debug!("Saved {} bytes to {}", json.len(), self.path.display());
        Ok(())
    }
}

/// Store that keeps the document in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    document: RwLock<Option<StateDocument>>,
    saves: RwLock<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: StateDocument) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            saves: RwLock::new(0),
        }
    }

    /// Number of completed saves
    pub fn save_count(&self) -> u64 {
        self.saves.read().map(|s| *s).unwrap_or(0)
    }

    /// Last saved document
    pub fn current(&self) -> Option<StateDocument> {
        self.document.read().ok().and_then(|d| d.clone())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load(&self) -> Result<Option<StateDocument>> {
        let document = self
            .document
            .read()
            .map_err(|_| MatchError::lock("snapshot"))?;
        Ok(document.clone())
    }

    async fn save(&self, document: &StateDocument) -> Result<()> {
        *self
            .document
            .write()
            .map_err(|_| MatchError::lock("snapshot"))? = Some(document.clone());
        *self.saves.write().map_err(|_| MatchError::lock("snapshot"))? += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::match_error;
    use crate::types::PlayerProfile;

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));

        let mut doc = StateDocument::default();
        doc.players.push(PlayerProfile::new(3, "three", 1000));
        doc.simulated_counter = 8;
        store.save(&doc).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(doc));
        assert!(!dir.path().join("nested").join("state.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{ truncated").await.unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert_eq!(match_error(&err).unwrap().kind(), "persistence");
    }

    #[tokio::test]
    async fn test_in_memory_counts_saves() {
        let store = InMemoryStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&StateDocument::default()).await.unwrap();
        store.save(&StateDocument::default()).await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert!(store.current().is_some());
    }

    #[tokio::test]
    async fn test_mock_store_load_failure() {
        let mut store = MockSnapshotStore::new();
        store.expect_load().times(1).returning(|| {
            Err(MatchError::Persistence {
                message: "disk on fire".to_string(),
            }
            .into())
        });

        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }
}
