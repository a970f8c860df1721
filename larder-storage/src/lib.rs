//! Larder Storage - Storage Trait and In-Memory Backend
//!
//! Defines the storage abstraction the cache layer sits on, plus a
//! reference in-memory implementation. Durable backends (SQL, KV) live
//! out of tree; they only need to implement [`StorageBackend`].
//!
//! The backend contract is deliberately narrow: key-equality queries,
//! id lookup, atomic bulk insert, and purge. Freshness filtering is NOT
//! the backend's job - the cache layer applies it on top (see
//! [`cache::FreshnessWindow`]).

pub mod cache;

pub use cache::{
    CacheFetcher, CacheRecord, CacheStats, FreshnessWindow, RefreshOperation,
    DEFAULT_REFRESH_INTERVAL_HOURS,
};

use async_trait::async_trait;
use larder_core::{RecordId, RecordKey, StorageError};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage backend for one record kind.
///
/// One backend instance owns one collection; the cache never reaches
/// across kinds. Implementations must be safe for concurrent use.
#[async_trait]
pub trait StorageBackend<R: CacheRecord>: Send + Sync {
    /// All records matching `key.field == key.value`, regardless of
    /// freshness, in ascending id order.
    async fn query_by_key(&self, key: &RecordKey) -> Result<Vec<R>, StorageError>;

    /// Look up a single record by id.
    async fn get_by_id(&self, id: RecordId) -> Result<Option<R>, StorageError>;

    /// Insert a batch of records as a single atomic unit.
    ///
    /// All-or-nothing: on any conflict no record from the batch may be
    /// persisted.
    async fn bulk_insert(&self, records: &[R]) -> Result<(), StorageError>;

    /// Delete every record of this kind, returning the count deleted.
    ///
    /// A failed purge is an error; implementations must not report it
    /// as zero rows deleted.
    async fn purge_all(&self) -> Result<u64, StorageError>;
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// In-memory storage backend.
///
/// Reference implementation of [`StorageBackend`], also used as the
/// test double. Records live in a `BTreeMap` keyed by id, so queries
/// come back in ascending id order for free.
#[derive(Debug, Default)]
pub struct MemoryStorage<R> {
    records: Arc<RwLock<BTreeMap<RecordId, R>>>,
}

impl<R> MemoryStorage<R> {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored records.
    ///
    /// A poisoned lock is an error here too, never reported as zero
    /// records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.len())
    }

    /// True if no records are stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl<R> Clone for MemoryStorage<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl<R: CacheRecord> StorageBackend<R> for MemoryStorage<R> {
    async fn query_by_key(&self, key: &RecordKey) -> Result<Vec<R>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records
            .values()
            .filter(|r| r.key_field(&key.field).as_ref() == Some(&key.value))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: RecordId) -> Result<Option<R>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(&id).cloned())
    }

    async fn bulk_insert(&self, batch: &[R]) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;

        // Validate the whole batch before touching the map.
        let mut batch_ids = std::collections::HashSet::new();
        for record in batch {
            let id = record.record_id();
            if id <= 0 {
                return Err(StorageError::InsertFailed {
                    kind: R::kind(),
                    reason: format!("non-positive id {id}"),
                });
            }
            if records.contains_key(&id) || !batch_ids.insert(id) {
                return Err(StorageError::InsertFailed {
                    kind: R::kind(),
                    reason: format!("duplicate id {id}"),
                });
            }
        }

        for record in batch {
            records.insert(record.record_id(), record.clone());
        }
        Ok(())
    }

    async fn purge_all(&self) -> Result<u64, StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        let deleted = records.len() as u64;
        records.clear();
        Ok(deleted)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::{now_utc, RecordKind, Timestamp};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct SearchHit {
        id: RecordId,
        query: String,
        title: String,
        created_at: Timestamp,
    }

    impl CacheRecord for SearchHit {
        fn kind() -> RecordKind {
            RecordKind("search_hits")
        }

        fn record_id(&self) -> RecordId {
            self.id
        }

        fn created_at(&self) -> Timestamp {
            self.created_at
        }

        fn key_field(&self, field: &str) -> Option<Value> {
            match field {
                "query" => Some(json!(self.query)),
                "title" => Some(json!(self.title)),
                _ => None,
            }
        }
    }

    fn make_hit(id: RecordId, query: &str) -> SearchHit {
        SearchHit {
            id,
            query: query.to_string(),
            title: format!("Title {id}"),
            created_at: now_utc(),
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_and_query_by_key() {
        let storage = MemoryStorage::new();
        storage
            .bulk_insert(&[make_hit(1, "batman"), make_hit(2, "superman"), make_hit(3, "batman")])
            .await
            .unwrap();

        let hits = storage
            .query_by_key(&RecordKey::new("query", "batman"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 3);
    }

    #[tokio::test]
    async fn test_query_by_unknown_field_matches_nothing() {
        let storage = MemoryStorage::new();
        storage.bulk_insert(&[make_hit(1, "batman")]).await.unwrap();

        let hits = storage
            .query_by_key(&RecordKey::new("director", "nolan"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let storage = MemoryStorage::new();
        storage.bulk_insert(&[make_hit(7, "batman")]).await.unwrap();

        let hit = storage.get_by_id(7).await.unwrap();
        assert_eq!(hit.unwrap().id, 7);
        assert!(storage.get_by_id(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_insert_duplicate_rolls_back_whole_batch() {
        let storage = MemoryStorage::new();
        storage.bulk_insert(&[make_hit(1, "batman")]).await.unwrap();

        let result = storage
            .bulk_insert(&[make_hit(2, "batman"), make_hit(1, "batman")])
            .await;
        assert!(matches!(result, Err(StorageError::InsertFailed { .. })));
        // Nothing from the failed batch made it in.
        assert_eq!(storage.len().unwrap(), 1);
        assert!(storage.get_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_insert_rejects_non_positive_ids() {
        let storage = MemoryStorage::new();
        let result = storage.bulk_insert(&[make_hit(0, "batman")]).await;
        assert!(matches!(result, Err(StorageError::InsertFailed { .. })));
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_len_reports_poisoned_lock_as_error() {
        let storage: MemoryStorage<SearchHit> = MemoryStorage::new();

        let poisoner = storage.clone();
        std::thread::spawn(move || {
            let _guard = poisoner.records.write().unwrap();
            panic!("poison the lock");
        })
        .join()
        .unwrap_err();

        // Poison surfaces as an error, not as "0 records".
        assert_eq!(storage.len(), Err(StorageError::LockPoisoned));
        assert_eq!(storage.is_empty(), Err(StorageError::LockPoisoned));
    }

    #[tokio::test]
    async fn test_purge_all_returns_count() {
        let storage = MemoryStorage::new();
        storage
            .bulk_insert(&[make_hit(1, "a"), make_hit(2, "b")])
            .await
            .unwrap();

        assert_eq!(storage.purge_all().await.unwrap(), 2);
        assert!(storage.is_empty().unwrap());
        // Purging an empty store really did delete zero rows.
        assert_eq!(storage.purge_all().await.unwrap(), 0);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
