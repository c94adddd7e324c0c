//! Content-addressed storage for signed attestations.
//!
//! This crate provides:
//! - the `AttestationStore` trait (insert-if-absent `put`, `get`, `list`)
//! - `MemoryStore` for tests and embedding
//! - `FileStore`, one JSON record per identifier under a directory
//!
//! Stores hold bytes; they do not vouch for them. Integrity is checked by
//! whoever reads a record, by recomputing its identifier.

#![deny(missing_docs)]

/// Error types for store operations.
pub mod error;
/// Directory-backed storage.
pub mod file;
/// In-memory storage.
pub mod memory;
/// Storage backend trait.
pub mod traits;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{AttestationStore, PutOutcome, StoredRecord};
