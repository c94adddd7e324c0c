use kgen_canonical::KeyId;

use crate::error::KeyError;
use crate::record::{KeyRecord, KeySignature};

/// Signing and key lookup as seen by attestation code.
pub trait KeyRing: Send + Sync {
    /// Signs `message` with an active key.
    fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<KeySignature, KeyError>;

    /// Public record of a key, including revoked keys.
    fn record(&self, key_id: &KeyId) -> Result<KeyRecord, KeyError>;
}
