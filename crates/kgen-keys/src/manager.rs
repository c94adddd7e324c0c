//! Key table with per-key exclusive sections.
//!
//! Lookups share a read lock on the table and release it before touching a
//! key. Signing, rotation and revocation each hold the key's own mutex for
//! their whole duration, so a rotation never races a signature made with the
//! key it replaces, while operations on unrelated keys proceed in parallel.
//!
//! Generation, rotation and revocation also take the keystore lock and only
//! touch the table once the keystore write with the new state has succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use kgen_canonical::{KeyId, Timestamp};
use tracing::{debug, info};

use crate::algorithm::{fingerprint, verify_signature, KeyAlgorithm, SecretKey};
use crate::clock::Clock;
use crate::error::KeyError;
use crate::keystore;
use crate::record::{KeyHandle, KeyRecord, KeySignature, KeyStatus, SignatureCheck};
use crate::traits::KeyRing;

/// Hex characters of the fingerprint used in generated key ids.
const KEY_ID_FINGERPRINT_LEN: usize = 16;

struct SlotState {
    record: KeyRecord,
    secret: SecretKey,
}

struct KeySlot {
    state: Mutex<SlotState>,
}

impl KeySlot {
    fn lock(&self) -> Result<MutexGuard<'_, SlotState>, KeyError> {
        self.state.lock().map_err(|_| KeyError::LockPoisoned)
    }
}

/// Creates, stores, rotates and enumerates signing keys.
pub struct KeyManager {
    table: RwLock<BTreeMap<KeyId, Arc<KeySlot>>>,
    clock: Arc<dyn Clock>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
    next_handle: AtomicU64,
}

impl KeyManager {
    /// Manager whose keys live only in memory.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(BTreeMap::new()),
            clock,
            path: None,
            write_lock: Mutex::new(()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Manager backed by a JSON keystore at `path`, created on first save.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, KeyError> {
        let path = path.as_ref().to_path_buf();
        let mut table = BTreeMap::new();
        let mut next = 1;
        for (mut record, secret) in keystore::load(&path)? {
            record.private_key_handle = KeyHandle::new(next);
            next += 1;
            table.insert(
                record.key_id.clone(),
                Arc::new(KeySlot {
                    state: Mutex::new(SlotState { record, secret }),
                }),
            );
        }
        debug!(path = %path.display(), keys = table.len(), "opened keystore");
        Ok(Self {
            table: RwLock::new(table),
            clock,
            path: Some(path),
            write_lock: Mutex::new(()),
            next_handle: AtomicU64::new(next),
        })
    }

    /// Keystore location, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Generates a key. Without an explicit id, the id is
    /// `<algorithm>-<first 16 hex of the fingerprint>`.
    pub fn generate_key_pair(
        &self,
        algorithm: KeyAlgorithm,
        key_id: Option<KeyId>,
    ) -> Result<KeyRecord, KeyError> {
        let _persist = self.write_lock.lock().map_err(|_| KeyError::LockPoisoned)?;
        let (record, secret) = self.new_key(algorithm, key_id)?;
        self.ensure_absent(&record.key_id)?;
        self.save_staged(&[(record.clone(), &secret)])?;
        self.insert(record.clone(), secret)?;
        info!(
            key_id = %record.key_id,
            algorithm = %record.algorithm,
            fingerprint = %record.fingerprint,
            "generated key"
        );
        Ok(record)
    }

    /// All keys, active and revoked, ordered by id.
    pub fn list_keys(&self) -> Result<Vec<KeyRecord>, KeyError> {
        self.slots()?
            .into_iter()
            .map(|slot| slot.lock().map(|state| state.record.clone()))
            .collect()
    }

    /// Record for `key_id`.
    pub fn get(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError> {
        let slot = self.slot(key_id)?;
        let state = slot.lock()?;
        Ok(state.record.clone())
    }

    /// Signs `message` with an active key.
    pub fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<KeySignature, KeyError> {
        let slot = self.slot(key_id)?;
        let mut state = slot.lock()?;
        if state.record.status != KeyStatus::Active {
            return Err(KeyError::revoked(key_id));
        }
        let value = state.secret.sign(message);
        state.record.signature_count += 1;
        state.record.last_used_at = Some(Timestamp::from_datetime(self.clock.now()));
        debug!(key_id = %key_id, count = state.record.signature_count, "signed");
        Ok(KeySignature {
            key_id: key_id.clone(),
            algorithm: state.record.algorithm,
            value,
        })
    }

    /// Revokes `key_id` and creates an active successor with the same algorithm.
    ///
    /// Nothing changes in memory unless the keystore write succeeds.
    pub fn rotate(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError> {
        let _persist = self.write_lock.lock().map_err(|_| KeyError::LockPoisoned)?;
        let slot = self.slot(key_id)?;
        let mut state = slot.lock()?;
        if state.record.status != KeyStatus::Active {
            return Err(KeyError::revoked(key_id));
        }
        let (successor, secret) = self.new_key(state.record.algorithm, None)?;
        self.ensure_absent(&successor.key_id)?;

        let mut retired = state.record.clone();
        retired.status = KeyStatus::Revoked;
        retired.revoked_at = Some(successor.created_at.clone());
        retired.rotated_to = Some(successor.key_id.clone());
        self.save_staged(&[
            (retired.clone(), &state.secret),
            (successor.clone(), &secret),
        ])?;

        self.insert(successor.clone(), secret)?;
        state.record = retired;
        drop(state);
        info!(key_id = %key_id, successor = %successor.key_id, "rotated key");
        Ok(successor)
    }

    /// Revokes `key_id` without a successor. Revoking twice is a no-op.
    pub fn revoke(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError> {
        let _persist = self.write_lock.lock().map_err(|_| KeyError::LockPoisoned)?;
        let slot = self.slot(key_id)?;
        let mut state = slot.lock()?;
        if state.record.status == KeyStatus::Revoked {
            return Ok(state.record.clone());
        }
        let mut revoked = state.record.clone();
        revoked.status = KeyStatus::Revoked;
        revoked.revoked_at = Some(Timestamp::from_datetime(self.clock.now()));
        self.save_staged(&[(revoked.clone(), &state.secret)])?;

        state.record = revoked.clone();
        drop(state);
        info!(key_id = %key_id, "revoked key");
        Ok(revoked)
    }

    /// Checks a signature against `key_id`. Revoked keys still verify.
    pub fn verify(
        &self,
        key_id: &KeyId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<SignatureCheck, KeyError> {
        let record = self.get(key_id)?;
        let public_key = record.public_key_bytes()?;
        let valid = verify_signature(record.algorithm, &public_key, message, signature)?;
        Ok(SignatureCheck {
            valid,
            status: record.status,
            algorithm: record.algorithm,
        })
    }

    /// Writes the keystore, including usage counters. No-op in memory.
    pub fn flush(&self) -> Result<(), KeyError> {
        let _persist = self.write_lock.lock().map_err(|_| KeyError::LockPoisoned)?;
        self.save_staged(&[])
    }

    /// Writes every key, with `staged` entries replacing or adding to the
    /// table. Callers hold `write_lock` and the slot locks of staged keys.
    fn save_staged(&self, staged: &[(KeyRecord, &SecretKey)]) -> Result<(), KeyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let others: Vec<Arc<KeySlot>> = {
            let table = self.table.read().map_err(|_| KeyError::LockPoisoned)?;
            table
                .iter()
                .filter(|(id, _)| !staged.iter().any(|(record, _)| &record.key_id == *id))
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };
        let guards = others
            .iter()
            .map(|slot| slot.lock())
            .collect::<Result<Vec<_>, _>>()?;
        let mut entries: Vec<(KeyRecord, &SecretKey)> = guards
            .iter()
            .map(|state| (state.record.clone(), &state.secret))
            .collect();
        entries.extend(
            staged
                .iter()
                .map(|(record, secret)| (record.clone(), *secret)),
        );
        entries.sort_by(|a, b| a.0.key_id.cmp(&b.0.key_id));
        keystore::save(path, &entries)?;
        debug!(path = %path.display(), keys = entries.len(), "saved keystore");
        Ok(())
    }

    fn ensure_absent(&self, key_id: &KeyId) -> Result<(), KeyError> {
        let table = self.table.read().map_err(|_| KeyError::LockPoisoned)?;
        if table.contains_key(key_id) {
            return Err(KeyError::DuplicateKey(key_id.clone()));
        }
        Ok(())
    }

    fn insert(&self, record: KeyRecord, secret: SecretKey) -> Result<(), KeyError> {
        let mut table = self.table.write().map_err(|_| KeyError::LockPoisoned)?;
        table.insert(
            record.key_id.clone(),
            Arc::new(KeySlot {
                state: Mutex::new(SlotState { record, secret }),
            }),
        );
        Ok(())
    }

    fn slot(&self, key_id: &KeyId) -> Result<Arc<KeySlot>, KeyError> {
        let table = self.table.read().map_err(|_| KeyError::LockPoisoned)?;
        table
            .get(key_id)
            .cloned()
            .ok_or_else(|| KeyError::unknown(key_id))
    }

    fn slots(&self) -> Result<Vec<Arc<KeySlot>>, KeyError> {
        let table = self.table.read().map_err(|_| KeyError::LockPoisoned)?;
        Ok(table.values().cloned().collect())
    }

    fn new_key(
        &self,
        algorithm: KeyAlgorithm,
        key_id: Option<KeyId>,
    ) -> Result<(KeyRecord, SecretKey), KeyError> {
        let secret = SecretKey::generate(algorithm)?;
        let public_key = secret.public_key_bytes()?;
        let fingerprint = fingerprint(&public_key);
        let key_id = match key_id {
            Some(id) => KeyId::parse(id.as_str())?,
            None => KeyId::parse(format!(
                "{}-{}",
                secret.algorithm().as_str(),
                &fingerprint[..KEY_ID_FINGERPRINT_LEN]
            ))?,
        };
        let record = KeyRecord {
            key_id,
            algorithm,
            public_key: URL_SAFE_NO_PAD.encode(&public_key),
            private_key_handle: KeyHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed)),
            created_at: Timestamp::from_datetime(self.clock.now()),
            status: KeyStatus::Active,
            fingerprint,
            signature_count: 0,
            last_used_at: None,
            revoked_at: None,
            rotated_to: None,
        };
        Ok((record, secret))
    }
}

impl KeyRing for KeyManager {
    fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<KeySignature, KeyError> {
        KeyManager::sign(self, key_id, message)
    }

    fn record(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError> {
        self.get(key_id)
    }
}
