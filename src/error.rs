//! Error taxonomy for the cache store
//!
//! Every public operation surfaces one of four conditions: a targeted
//! lookup missed, persisted state is internally inconsistent, the
//! underlying database or filesystem failed, or the store was already
//! closed. Absent sub-namespaces during reads are NOT errors; readers
//! coerce them to empty.

use thiserror::Error;

/// Result alias used throughout the store.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`crate::CacheStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A targeted `load` or `release` referenced a missing entity.
    #[error("entry not found")]
    NotFound,

    /// Persisted state is internally inconsistent (malformed composite
    /// key, undecodable record blob). The current transaction rolls
    /// back; the store remains usable.
    #[error("corrupt cache state: {0}")]
    Corrupt(String),

    /// Underlying database or filesystem failure.
    #[error("storage i/o: {0}")]
    Io(String),

    /// Operation invoked after `close`.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// True iff this is the not-found condition.
    ///
    /// Callers that treat a missing entity as a soft outcome (the
    /// solver probing for a cached result) branch on this instead of
    /// matching the enum.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
