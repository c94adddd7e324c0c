//! In-memory backend.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::RwLock;

use kgen_canonical::Cid;

use crate::error::StoreError;
use crate::traits::{AttestationStore, PutOutcome, StoredRecord};

/// In-memory store suitable for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<Cid, StoredRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttestationStore for MemoryStore {
    fn put(&self, cid: &Cid, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        match records.entry(cid.clone()) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(PutOutcome::Inserted)
            }
        }
    }

    fn get(&self, cid: &Cid) -> Result<StoredRecord, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        records
            .get(cid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(cid.clone()))
    }

    fn list(&self) -> Result<Vec<Cid>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.keys().cloned().collect())
    }
}
