use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use kgen_canonical::{KeyId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::algorithm::KeyAlgorithm;
use crate::error::KeyError;

/// Lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// May sign and verify.
    Active,
    /// Verify only.
    Revoked,
}

/// Opaque reference to private material held by the key manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(u64);

impl KeyHandle {
    pub(crate) fn new(slot: u64) -> Self {
        Self(slot)
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Public view of a managed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key identifier.
    pub key_id: KeyId,
    /// Signature algorithm.
    pub algorithm: KeyAlgorithm,
    /// Public key (URL-safe base64): raw 32 bytes for Ed25519, PKCS#1 DER for RSA.
    pub public_key: String,
    /// Handle to the private material.
    pub private_key_handle: KeyHandle,
    /// Creation time.
    pub created_at: Timestamp,
    /// Lifecycle state.
    pub status: KeyStatus,
    /// Hex SHA-256 of the public key bytes.
    pub fingerprint: String,
    /// Signatures produced so far.
    pub signature_count: u64,
    /// Time of the last signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<Timestamp>,
    /// Time the key was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<Timestamp>,
    /// Successor created by rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_to: Option<KeyId>,
}

impl KeyRecord {
    /// Decoded public key bytes.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, KeyError> {
        URL_SAFE_NO_PAD
            .decode(self.public_key.as_bytes())
            .map_err(|err| KeyError::Crypto(format!("public key encoding: {}", err)))
    }

    /// Whether the key may still sign.
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Signature produced by the key manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySignature {
    /// Signing key.
    pub key_id: KeyId,
    /// Algorithm used.
    pub algorithm: KeyAlgorithm,
    /// Raw signature bytes.
    pub value: Vec<u8>,
}

/// Outcome of checking a signature against a managed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureCheck {
    /// Whether the signature is cryptographically valid.
    pub valid: bool,
    /// Key state at the time of the check.
    pub status: KeyStatus,
    /// Key algorithm.
    pub algorithm: KeyAlgorithm,
}
