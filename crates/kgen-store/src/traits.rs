//! Storage backend trait.

use kgen_canonical::{Cid, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Persisted form of one attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Compact JWS envelope as produced by the signer.
    pub envelope: String,
    /// First time the record was stored.
    pub stored_at: Timestamp,
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Record was written.
    Inserted,
    /// A record already existed under this identifier and was kept.
    AlreadyPresent,
}

/// Content-addressed record storage.
///
/// Records are keyed by the identifier of their envelope bytes. Writes are
/// insert-if-absent, so storing the same attestation twice is harmless and
/// concurrent writers of the same record converge on one copy. Backends do
/// not check that a key matches its record; readers recompute the digest.
pub trait AttestationStore: Send + Sync {
    /// Stores `record` under `cid` unless something is already there.
    fn put(&self, cid: &Cid, record: &StoredRecord) -> Result<PutOutcome, StoreError>;

    /// Fetches the record under `cid`.
    fn get(&self, cid: &Cid) -> Result<StoredRecord, StoreError>;

    /// Identifiers of all stored records, sorted.
    fn list(&self) -> Result<Vec<Cid>, StoreError>;
}
