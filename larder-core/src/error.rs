//! Error types for larder operations

use crate::{RecordId, RecordKind};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {kind} with id {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("Insert failed for {kind}: {reason}")]
    InsertFailed { kind: RecordKind, reason: String },

    #[error("Query failed for {kind}: {reason}")]
    QueryFailed { kind: RecordKind, reason: String },

    // A purge that fails is an error, never reported as zero rows deleted.
    #[error("Purge failed for {kind}: {reason}")]
    PurgeFailed { kind: RecordKind, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Refresh interval must not be negative, got {hours} hours")]
    NegativeRefreshInterval { hours: i64 },
}

/// Failure produced by a refresh operation.
///
/// The cache records only the reason; whether the failure is retryable
/// is between the caller and its upstream source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct RefreshError {
    pub reason: String,
}

impl RefreshError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<String> for RefreshError {
    fn from(reason: String) -> Self {
        Self { reason }
    }
}

impl From<&str> for RefreshError {
    fn from(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Fetch path errors.
///
/// Every failure on the miss path aborts the whole fetch; there is no
/// partial success and no silent fallback to stale data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("No refresh operation supplied for cache miss on {kind}")]
    InvalidRefreshOperation { kind: RecordKind },

    #[error("Refresh operation failed for {kind}: {reason}")]
    RefreshFailed { kind: RecordKind, reason: String },

    #[error("Refresh operation for {kind} returned invalid records: {reason}")]
    InvalidRefreshResult { kind: RecordKind, reason: String },

    #[error("Failed to persist refreshed records for {kind}: {reason}")]
    PersistenceFailed { kind: RecordKind, reason: String },

    #[error("Record id must be positive, got {id}")]
    InvalidIdentifier { id: RecordId },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level error aggregating all larder failure domains.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LarderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Result alias for larder operations.
pub type LarderResult<T> = Result<T, LarderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::InvalidIdentifier { id: -5 };
        assert_eq!(err.to_string(), "Record id must be positive, got -5");
    }

    #[test]
    fn test_storage_error_converts_into_fetch_error() {
        let storage = StorageError::InsertFailed {
            kind: RecordKind("search_results"),
            reason: "duplicate id 3".to_string(),
        };
        let fetch: FetchError = storage.clone().into();
        assert_eq!(fetch, FetchError::Storage(storage));
    }

    #[test]
    fn test_larder_error_aggregates_domains() {
        let err: LarderError = ConfigError::NegativeRefreshInterval { hours: -1 }.into();
        assert!(matches!(err, LarderError::Config(_)));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_refresh_error_from_str() {
        let err: RefreshError = "upstream unavailable".into();
        assert_eq!(err.to_string(), "upstream unavailable");
    }
}
