//! Time-windowed cache with refresh-on-miss.
//!
//! Serves records from storage while they are inside a configurable
//! freshness window; on a miss it synchronously repopulates the window
//! by invoking a caller-supplied refresh operation, persists the result,
//! and returns it. Invalidation is lazy and pull-based: stale records
//! are simply excluded from reads, never proactively deleted.
//!
//! # Control flow
//!
//! Per fetch, strictly linear: query storage for the key, filter through
//! the freshness window, and only on an empty result call out to the
//! refresh operation. A hit never invokes refresh and never writes.
//!
//! # Concurrency
//!
//! Two simultaneous misses on the same key would both refresh and both
//! persist, duplicating records. [`CacheFetcher`] closes that gap with a
//! per-key flight lock: one refresh in flight per key, late arrivals
//! re-query under the lock and usually return the winner's records.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = CacheFetcher::new(storage, 24)?;
//! let key = RecordKey::new("query", "batman");
//!
//! // Hit if fresh results exist, otherwise refresh + persist + return.
//! let hits = fetcher.fetch(&key, Some(&omdb_search)).await?;
//! ```

pub mod fetcher;
pub mod freshness;
pub mod traits;

pub use fetcher::CacheFetcher;
pub use freshness::{FreshnessWindow, DEFAULT_REFRESH_INTERVAL_HOURS};
pub use traits::{CacheRecord, CacheStats, RefreshOperation};
