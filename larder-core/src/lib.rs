//! Larder Core - Identity and Key Types
//!
//! Pure data structures with no behavior. The storage and cache crates
//! depend on this; it contains ONLY data types, error enums, and small
//! time helpers - no caching logic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod error;
pub mod time;

pub use error::{ConfigError, FetchError, LarderError, LarderResult, RefreshError, StorageError};
pub use time::{hours_future, hours_past, now_utc, Timestamp};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Record identifier. Assigned by whoever creates the record (a refresh
/// operation or an out-of-band seeder), always positive; storage
/// validates it on insert.
///
/// Lookups with a zero or negative id are rejected at the boundary and
/// never reach the storage backend.
pub type RecordId = i64;

/// Name of the storage collection a record type belongs to.
///
/// One kind maps to one collection (table); a cache fetcher manages
/// exactly one kind. Used in diagnostics, stats, and purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordKind(pub &'static str);

impl RecordKind {
    /// The collection name.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ============================================================================
// RECORD KEY
// ============================================================================

/// Equality filter a fetch runs against storage: records whose `field`
/// equals `value`.
///
/// The value is a JSON scalar so keys may be strings, numbers, or bools
/// without the cache caring which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordKey {
    /// Name of the key field on the record.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl RecordKey {
    /// Create a key filter for `field == value`.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Canonical string identity for this key, used to scope per-key
    /// mutual exclusion on the miss path.
    pub fn flight_key(&self) -> String {
        format!("{}={}", self.field, self.value)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.field, self.value)
    }
}
