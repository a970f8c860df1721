//! Cacheable record contract and refresh operation trait.
//!
//! The record contract is statically typed: a refresh operation for kind
//! `R` can only ever produce `Vec<R>`, so the wrong-type case the cache
//! would otherwise have to police at runtime cannot be constructed.

use async_trait::async_trait;
use larder_core::{RecordId, RecordKey, RecordKind, RefreshError, Timestamp};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Contract for types the cache can manage.
///
/// A record is opaque to the cache beyond three facts: its identifier,
/// its creation time, and the values of its key fields. Everything else
/// passes through untouched; the cache never mutates a record.
///
/// # Implementation Requirements
///
/// - `kind()` must return the same value for all instances
/// - `record_id()` must be positive and unique within the kind
/// - `key_field()` must return `None` for unknown field names
/// - Implementations must be `Clone`, `Serialize`, and `DeserializeOwned`
///   so backends can store them however they like
pub trait CacheRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The storage collection this record type lives in.
    fn kind() -> RecordKind;

    /// Unique identifier within the kind.
    fn record_id(&self) -> RecordId;

    /// When the record was created. Freshness is measured against this.
    fn created_at(&self) -> Timestamp;

    /// Value of a named key field, used for equality filtering and for
    /// validating refresh output against the requested key.
    fn key_field(&self, field: &str) -> Option<Value>;
}

/// Caller-supplied operation that repopulates the cache on a miss.
///
/// Given the key that missed, produce a non-empty ordered sequence of
/// new records, or fail. The operation must not persist anything itself;
/// the fetcher owns persistence. Auxiliary inputs (API clients, page
/// sizes) are captured state of the implementor.
#[async_trait]
pub trait RefreshOperation<R: CacheRecord>: Send + Sync {
    async fn refresh(&self, key: &RecordKey) -> Result<Vec<R>, RefreshError>;
}

/// Counters observed by a cache fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetches served from storage without invoking refresh.
    pub hits: u64,
    /// Fetches that found no fresh records.
    pub misses: u64,
    /// Refresh operations actually invoked.
    pub refreshes: u64,
    /// Refresh invocations that failed or returned invalid records.
    pub refresh_failures: u64,
}
