use crate::error::{CinemaError, Result};
use crate::models::{Collection, StoredMovie};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Durable home for the two collections. Records are handed over in
/// most-recent-first order and must come back in the same order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates whatever the backend needs. Must be idempotent and never
    /// discard existing data.
    async fn init(&self) -> Result<()>;

    async fn load(&self, collection: Collection) -> Result<Vec<StoredMovie>>;

    async fn save(&self, collection: Collection, records: &[StoredMovie]) -> Result<()>;
}

/// One JSON document per collection under a data directory.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CinemaError::StorageUnavailable(format!(
                "cannot create data directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        for collection in Collection::ALL {
            let path = self.collection_path(collection);
            if !tokio::fs::try_exists(&path).await? {
                debug!("Creating empty {} collection at {}", collection, path.display());
                self.save(collection, &[]).await?;
            }
        }
        Ok(())
    }

    async fn load(&self, collection: Collection) -> Result<Vec<StoredMovie>> {
        let path = self.collection_path(collection);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} collection file does not exist yet", collection);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| {
            warn!("Corrupt {} collection at {}: {}", collection, path.display(), e);
            CinemaError::StorageUnavailable(format!("corrupt {} collection: {}", collection, e))
        })
    }

    async fn save(&self, collection: Collection, records: &[StoredMovie]) -> Result<()> {
        let path = self.collection_path(collection);
        let serialized = serde_json::to_vec_pretty(records)
            .map_err(|e| CinemaError::StorageUnavailable(e.to_string()))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, serialized).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        info!("Saved {} collection: {} records", collection, records.len());
        Ok(())
    }
}

/// Process-local backend; nothing survives the process.
#[derive(Default)]
pub struct MemoryBackend {
    collections: Mutex<HashMap<Collection, Vec<StoredMovie>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn init(&self) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| CinemaError::StorageUnavailable("memory store poisoned".to_string()))?;
        for collection in Collection::ALL {
            collections.entry(collection).or_default();
        }
        Ok(())
    }

    async fn load(&self, collection: Collection) -> Result<Vec<StoredMovie>> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| CinemaError::StorageUnavailable("memory store poisoned".to_string()))?;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn save(&self, collection: Collection, records: &[StoredMovie]) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| CinemaError::StorageUnavailable("memory store poisoned".to_string()))?;
        collections.insert(collection, records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_movie;
    use tempfile::TempDir;

    fn stored(id: &str, timestamp: i64) -> StoredMovie {
        StoredMovie {
            movie: sample_movie(id, "Arrival"),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_file_backend_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("data"));

        backend.init().await.unwrap();
        backend.save(Collection::Watchlist, &[stored("a", 1)]).await.unwrap();
        backend.init().await.unwrap();

        let records = backend.load(Collection::Watchlist).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(backend.dir().join("history.json").exists());
    }

    #[tokio::test]
    async fn test_file_backend_preserves_order() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        backend.init().await.unwrap();

        let records = vec![stored("b", 2), stored("a", 1)];
        backend.save(Collection::History, &records).await.unwrap();

        let loaded = backend.load(Collection::History).await.unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_file_backend_corrupt_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());
        std::fs::write(dir.path().join("history.json"), "{not json").unwrap();

        let result = backend.load(Collection::History).await;
        assert!(matches!(result, Err(CinemaError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_file_backend_unwritable_dir_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let backend = FileBackend::new(blocker.join("data"));

        let result = backend.init().await;
        assert!(matches!(result, Err(CinemaError::StorageUnavailable(_))));
    }
}
