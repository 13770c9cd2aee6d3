mod backend;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

use crate::error::Result;
use crate::models::{Collection, Movie, StoredMovie};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Local persistence for watch history and the watchlist.
///
/// Every operation is one transaction over one collection: load, mutate,
/// save, all under the store lock. Records are kept most-recent-first so a
/// stable sort by timestamp resolves equal timestamps in favour of the
/// later write.
pub struct InteractionStore {
    backend: Box<dyn StorageBackend>,
    history_limit: Option<usize>,
    lock: Mutex<()>,
}

impl InteractionStore {
    /// Initializes the backend and returns a ready handle.
    pub async fn open(backend: Box<dyn StorageBackend>, history_limit: Option<usize>) -> Result<Self> {
        backend.init().await?;
        debug!("Interaction store ready (history limit: {:?})", history_limit);
        Ok(Self {
            backend,
            history_limit,
            lock: Mutex::new(()),
        })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::open(Box::new(MemoryBackend::new()), None).await
    }

    /// Inserts or overwrites `movie` by id and refreshes its timestamp.
    #[instrument(skip(self, movie), fields(id = %movie.id))]
    pub async fn put(&self, collection: Collection, movie: &Movie) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.backend.load(collection).await?;
        upsert(&mut records, movie.clone(), Utc::now().timestamp_millis());

        if collection == Collection::History {
            if let Some(limit) = self.history_limit {
                evict_oldest(&mut records, limit);
            }
        }

        self.backend.save(collection, &records).await?;
        debug!("Stored {} in {}", movie.id, collection);
        Ok(())
    }

    /// Deletes the record if present; absent ids are not an error.
    #[instrument(skip(self))]
    pub async fn remove(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.backend.load(collection).await?;
        let before = records.len();
        records.retain(|r| r.movie.id != id);

        if records.len() == before {
            debug!("{} not in {}, nothing to remove", id, collection);
            return Ok(());
        }

        self.backend.save(collection, &records).await
    }

    /// All records, most recently written first.
    #[instrument(skip(self))]
    pub async fn list(&self, collection: Collection) -> Result<Vec<StoredMovie>> {
        let _guard = self.lock.lock().await;
        let mut records = self.backend.load(collection).await?;
        sort_by_recency(&mut records);
        Ok(records)
    }

    pub async fn contains(&self, collection: Collection, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let records = self.backend.load(collection).await?;
        Ok(records.iter().any(|r| r.movie.id == id))
    }

    /// Removes `movie` if present, otherwise stores it. Returns whether the
    /// movie is in the collection afterwards.
    pub async fn toggle(&self, collection: Collection, movie: &Movie) -> Result<bool> {
        if self.contains(collection, &movie.id).await? {
            self.remove(collection, &movie.id).await?;
            info!("Removed {} from {}", movie.title, collection);
            Ok(false)
        } else {
            self.put(collection, movie).await?;
            info!("Added {} to {}", movie.title, collection);
            Ok(true)
        }
    }

    /// Opening a link records the movie in history.
    pub async fn record_open(&self, movie: &Movie) -> Result<()> {
        self.put(Collection::History, movie).await
    }
}

fn upsert(records: &mut Vec<StoredMovie>, movie: Movie, timestamp: i64) {
    records.retain(|r| r.movie.id != movie.id);
    records.insert(0, StoredMovie { movie, timestamp });
}

fn sort_by_recency(records: &mut [StoredMovie]) {
    // stable: equal timestamps keep storage order
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn evict_oldest(records: &mut Vec<StoredMovie>, limit: usize) {
    if records.len() <= limit {
        return;
    }
    sort_by_recency(records);
    let evicted = records.len() - limit;
    records.truncate(limit);
    debug!("Evicted {} old history entries", evicted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CinemaError;
    use crate::models::sample_movie;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn ids(records: &[StoredMovie]) -> Vec<&str> {
        records.iter().map(|r| r.movie.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_put_then_list_returns_record() {
        let store = InteractionStore::in_memory().await.unwrap();
        let movie = sample_movie("m1", "Dune");

        store.put(Collection::Watchlist, &movie).await.unwrap();

        let records = store.list(Collection::Watchlist).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].movie, movie);
        assert!(records[0].timestamp > 0);
    }

    #[tokio::test]
    async fn test_put_twice_overwrites() {
        let store = InteractionStore::in_memory().await.unwrap();
        let mut movie = sample_movie("m1", "Dune");
        store.put(Collection::History, &movie).await.unwrap();

        movie.rating = 9.1;
        store.put(Collection::History, &movie).await.unwrap();

        let records = store.list(Collection::History).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].movie.rating, 9.1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let store = InteractionStore::in_memory().await.unwrap();
        store.put(Collection::Watchlist, &sample_movie("m1", "Dune")).await.unwrap();

        store.remove(Collection::Watchlist, "missing").await.unwrap();

        let records = store.list(Collection::Watchlist).await.unwrap();
        assert_eq!(ids(&records), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_list_orders_by_most_recent_write() {
        let store = InteractionStore::in_memory().await.unwrap();
        store.put(Collection::History, &sample_movie("a", "Alien")).await.unwrap();
        store.put(Collection::History, &sample_movie("b", "Blade Runner")).await.unwrap();
        store.put(Collection::History, &sample_movie("a", "Alien")).await.unwrap();

        let records = store.list(Collection::History).await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b"]);
    }

    #[test]
    fn test_equal_timestamps_keep_latest_write_first() {
        let mut records = Vec::new();
        upsert(&mut records, sample_movie("a", "Alien"), 100);
        upsert(&mut records, sample_movie("b", "Blade Runner"), 100);
        upsert(&mut records, sample_movie("c", "Casablanca"), 100);
        sort_by_recency(&mut records);
        assert_eq!(ids(&records), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let store = InteractionStore::in_memory().await.unwrap();
        store.put(Collection::History, &sample_movie("m1", "Dune")).await.unwrap();

        assert!(store.list(Collection::Watchlist).await.unwrap().is_empty());
        assert!(store.contains(Collection::History, "m1").await.unwrap());
        assert!(!store.contains(Collection::Watchlist, "m1").await.unwrap());
    }

    #[tokio::test]
    async fn test_watchlist_end_to_end() {
        let store = InteractionStore::in_memory().await.unwrap();
        store.put(Collection::Watchlist, &sample_movie("m1", "X")).await.unwrap();

        let records = store.list(Collection::Watchlist).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].movie.id, "m1");

        store.remove(Collection::Watchlist, "m1").await.unwrap();
        assert!(store.list(Collection::Watchlist).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_flips_membership() {
        let store = InteractionStore::in_memory().await.unwrap();
        let movie = sample_movie("m1", "Dune");

        assert!(store.toggle(Collection::Watchlist, &movie).await.unwrap());
        assert!(store.contains(Collection::Watchlist, "m1").await.unwrap());
        assert!(!store.toggle(Collection::Watchlist, &movie).await.unwrap());
        assert!(!store.contains(Collection::Watchlist, "m1").await.unwrap());
    }

    #[tokio::test]
    async fn test_history_limit_evicts_oldest() {
        let store = InteractionStore::open(Box::new(MemoryBackend::new()), Some(2))
            .await
            .unwrap();
        for id in ["a", "b", "c"] {
            store.record_open(&sample_movie(id, "Film")).await.unwrap();
        }

        let records = store.list(Collection::History).await.unwrap();
        assert_eq!(ids(&records), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_watchlist_is_not_capped() {
        let store = InteractionStore::open(Box::new(MemoryBackend::new()), Some(1))
            .await
            .unwrap();
        store.put(Collection::Watchlist, &sample_movie("a", "Film")).await.unwrap();
        store.put(Collection::Watchlist, &sample_movie("b", "Film")).await.unwrap();

        assert_eq!(store.list(Collection::Watchlist).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = InteractionStore::open(Box::new(FileBackend::new(dir.path())), None)
                .await
                .unwrap();
            store.put(Collection::Watchlist, &sample_movie("m1", "Dune")).await.unwrap();
        }

        let store = InteractionStore::open(Box::new(FileBackend::new(dir.path())), None)
            .await
            .unwrap();
        let records = store.list(Collection::Watchlist).await.unwrap();
        assert_eq!(ids(&records), vec!["m1"]);
    }

    struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn load(&self, _collection: Collection) -> Result<Vec<StoredMovie>> {
            Ok(Vec::new())
        }

        async fn save(&self, _collection: Collection, _records: &[StoredMovie]) -> Result<()> {
            Err(CinemaError::StorageUnavailable("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let store = InteractionStore::open(Box::new(FailingBackend), None).await.unwrap();
        let result = store.put(Collection::History, &sample_movie("m1", "Dune")).await;
        assert!(matches!(result, Err(CinemaError::StorageUnavailable(_))));
    }
}
