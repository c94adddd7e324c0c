//! Error types for store operations.

use kgen_canonical::Cid;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record under this identifier.
    #[error("not found: {0}")]
    NotFound(Cid),
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored record is not valid JSON.
    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
    /// Other error.
    #[error("{0}")]
    Other(String),
}
