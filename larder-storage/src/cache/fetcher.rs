//! Fetch orchestration: query, refresh on miss, persist, return.
//!
//! [`CacheFetcher`] is the single public entry point into the cache. Each
//! fetch is stateless with respect to prior fetches except through the
//! shared storage backend and the hit/miss counters.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use larder_core::{now_utc, ConfigError, FetchError, RecordId, RecordKey, Timestamp};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::freshness::FreshnessWindow;
use super::traits::{CacheRecord, CacheStats, RefreshOperation};
use crate::StorageBackend;

/// Cache fetcher for one record kind.
///
/// Owns the freshness window for its kind; the window is injected at
/// construction and mutable at runtime, scoped to this instance rather
/// than shared process-wide. Callers that need different windows for
/// different kinds construct distinct fetchers.
///
/// # Fetch algorithm
///
/// 1. Query storage for records matching the key, filter through the
///    freshness window. Non-empty result: cache hit, return as-is.
///    Refresh is never invoked and nothing is written.
/// 2. Empty result: cache miss (including "matches exist but all are
///    stale"). Acquire the per-key flight lock, re-query, and if still
///    empty invoke the refresh operation, validate its output, persist
///    it atomically, and return it.
///
/// Any failure on the miss path aborts the whole fetch. The fetcher
/// never retries and never falls back to stale data; retry is the
/// caller's decision, by fetching again.
pub struct CacheFetcher<R, S>
where
    R: CacheRecord,
    S: StorageBackend<R>,
{
    /// The storage backend holding durable records.
    storage: Arc<S>,
    /// Freshness window in hours. Kept atomic so the interval can be
    /// changed while fetches are in flight; changes apply to subsequent
    /// fetches only.
    refresh_interval_hours: AtomicI64,
    /// One lock per key with a refresh in flight.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    _record: PhantomData<fn() -> R>,
}

impl<R, S> CacheFetcher<R, S>
where
    R: CacheRecord,
    S: StorageBackend<R>,
{
    /// Create a fetcher with the given freshness window in hours.
    ///
    /// Negative intervals are a configuration error.
    pub fn new(storage: Arc<S>, refresh_interval_hours: i64) -> Result<Self, ConfigError> {
        let window = FreshnessWindow::from_hours(refresh_interval_hours)?;
        Ok(Self {
            storage,
            refresh_interval_hours: AtomicI64::new(window.hours()),
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            _record: PhantomData,
        })
    }

    /// Create a fetcher with the default 24-hour window.
    pub fn with_defaults(storage: Arc<S>) -> Self {
        Self {
            storage,
            refresh_interval_hours: AtomicI64::new(FreshnessWindow::default().hours()),
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            _record: PhantomData,
        }
    }

    /// Current freshness window in hours.
    pub fn refresh_interval(&self) -> i64 {
        self.refresh_interval_hours.load(Ordering::Relaxed)
    }

    /// Change the freshness window. Takes effect for subsequent fetches;
    /// results already being computed are not reevaluated.
    pub fn set_refresh_interval(&self, hours: i64) -> Result<(), ConfigError> {
        let window = FreshnessWindow::from_hours(hours)?;
        self.refresh_interval_hours
            .store(window.hours(), Ordering::Relaxed);
        Ok(())
    }

    /// Counters observed so far.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }

    /// A reference to the underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetch records for `key`, refreshing on miss via `refresh`.
    ///
    /// See the type-level docs for the algorithm. Passing `None` for
    /// `refresh` makes a miss fail with
    /// [`FetchError::InvalidRefreshOperation`].
    pub async fn fetch(
        &self,
        key: &RecordKey,
        refresh: Option<&dyn RefreshOperation<R>>,
    ) -> Result<Vec<R>, FetchError> {
        self.fetch_at(key, refresh, now_utc()).await
    }

    /// [`fetch`](Self::fetch) with an explicit current time, for callers
    /// and tests that inject the clock.
    pub async fn fetch_at(
        &self,
        key: &RecordKey,
        refresh: Option<&dyn RefreshOperation<R>>,
        now: Timestamp,
    ) -> Result<Vec<R>, FetchError> {
        let fresh = self.query_fresh(key, now).await?;
        if !fresh.is_empty() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %R::kind(), key = %key, count = fresh.len(), "cache hit");
            return Ok(fresh);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(kind = %R::kind(), key = %key, "cache miss");

        let Some(refresh) = refresh else {
            return Err(FetchError::InvalidRefreshOperation { kind: R::kind() });
        };

        // One refresh in flight per key. Concurrent misses serialize
        // here; whoever arrives second re-queries and returns the
        // winner's records instead of refreshing again.
        let flight = self.flight_lock(key).await;
        let guard = flight.lock().await;
        let result = self.resolve_miss(key, refresh, now).await;
        drop(guard);
        self.release_flight(key, &flight).await;
        result
    }

    /// Miss path, run under the per-key flight lock.
    async fn resolve_miss(
        &self,
        key: &RecordKey,
        refresh: &dyn RefreshOperation<R>,
        now: Timestamp,
    ) -> Result<Vec<R>, FetchError> {
        let fresh = self.query_fresh(key, now).await?;
        if !fresh.is_empty() {
            debug!(kind = %R::kind(), key = %key, "repopulated by concurrent fetch");
            return Ok(fresh);
        }

        self.refresh_and_persist(key, refresh).await
    }

    /// Look up a single record by id, bypassing the freshness window.
    ///
    /// Non-positive ids are rejected before reaching storage.
    pub async fn get_by_id(&self, id: RecordId) -> Result<Option<R>, FetchError> {
        if id <= 0 {
            return Err(FetchError::InvalidIdentifier { id });
        }
        Ok(self.storage.get_by_id(id).await?)
    }

    /// Delete every record of this kind, returning the count deleted.
    ///
    /// Not part of the fetch path; used for cache reset. A failed purge
    /// surfaces as an error and is never conflated with "zero rows".
    pub async fn purge(&self) -> Result<u64, FetchError> {
        Ok(self.storage.purge_all().await?)
    }

    fn window(&self) -> FreshnessWindow {
        FreshnessWindow::from_hours_unchecked(self.refresh_interval())
    }

    async fn query_fresh(&self, key: &RecordKey, now: Timestamp) -> Result<Vec<R>, FetchError> {
        let candidates = self.storage.query_by_key(key).await?;
        Ok(self.window().fresh_only(candidates, now))
    }

    async fn flight_lock(&self, key: &RecordKey) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights.entry(key.flight_key()).or_default().clone()
    }

    /// Drop the map entry for a finished flight once no other fetch
    /// holds it, so the map stays bounded by in-flight keys rather than
    /// growing with every distinct key ever missed.
    async fn release_flight(&self, key: &RecordKey, flight: &Arc<Mutex<()>>) {
        let mut flights = self.flights.lock().await;
        // Two strong references mean map entry + our handle; any more
        // and another fetch is still waiting on this lock.
        if Arc::strong_count(flight) <= 2 {
            flights.remove(&key.flight_key());
        }
    }

    /// Miss path tail: invoke refresh, validate, persist, return.
    async fn refresh_and_persist(
        &self,
        key: &RecordKey,
        refresh: &dyn RefreshOperation<R>,
    ) -> Result<Vec<R>, FetchError> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let produced = refresh.refresh(key).await.map_err(|e| {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
            warn!(kind = %R::kind(), key = %key, reason = %e, "refresh operation failed");
            FetchError::RefreshFailed {
                kind: R::kind(),
                reason: e.reason,
            }
        })?;

        self.validate_refresh_result(key, &produced).map_err(|e| {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
            warn!(kind = %R::kind(), key = %key, error = %e, "refresh returned invalid records");
            e
        })?;

        // All-or-nothing: if persistence fails the fetch fails, so a
        // caller never receives records a subsequent fetch cannot hit.
        self.storage.bulk_insert(&produced).await.map_err(|e| {
            warn!(kind = %R::kind(), key = %key, error = %e, "failed to persist refreshed records");
            FetchError::PersistenceFailed {
                kind: R::kind(),
                reason: e.to_string(),
            }
        })?;

        debug!(kind = %R::kind(), key = %key, count = produced.len(), "cache refreshed");
        Ok(produced)
    }

    /// Refresh output must be non-empty, and every record must carry the
    /// requested key so later fetches can actually hit it. Element types
    /// are already pinned by the `RefreshOperation<R>` contract.
    fn validate_refresh_result(&self, key: &RecordKey, produced: &[R]) -> Result<(), FetchError> {
        if produced.is_empty() {
            return Err(FetchError::InvalidRefreshResult {
                kind: R::kind(),
                reason: "returned no records".to_string(),
            });
        }
        for record in produced {
            if record.key_field(&key.field).as_ref() != Some(&key.value) {
                return Err(FetchError::InvalidRefreshResult {
                    kind: R::kind(),
                    reason: format!(
                        "record {} does not match requested key {}",
                        record.record_id(),
                        key
                    ),
                });
            }
        }
        Ok(())
    }
}
