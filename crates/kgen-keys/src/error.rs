use std::fmt;
use std::path::PathBuf;

use kgen_canonical::{KeyId, ValidationError};
use thiserror::Error;

/// Why a key cannot be used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// No key with this id.
    Unknown,
    /// Key exists but was revoked or rotated away.
    Revoked,
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unavailability::Unknown => "unknown",
            Unavailability::Revoked => "revoked",
        })
    }
}

/// Errors from key management.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key is missing or may no longer sign.
    #[error("key unavailable: {key_id} is {reason}")]
    KeyUnavailable {
        /// Requested key.
        key_id: KeyId,
        /// Missing or revoked.
        reason: Unavailability,
    },
    /// A key with this id already exists.
    #[error("key already exists: {0}")]
    DuplicateKey(KeyId),
    /// Algorithm name not recognised.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Key material could not be generated, decoded or used.
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Identifier failed validation.
    #[error("invalid identifier: {0}")]
    Invalid(#[from] ValidationError),
    /// Keystore file could not be read or written.
    #[error("keystore {path}: {source}")]
    Keystore {
        /// Keystore location.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Keystore written by an incompatible version.
    #[error("unsupported keystore version {0}")]
    KeystoreVersion(u32),
    /// Keystore contents are not valid.
    #[error("keystore format: {0}")]
    Format(#[from] serde_json::Error),
    /// A thread panicked while holding a key lock.
    #[error("key table lock poisoned")]
    LockPoisoned,
}

impl KeyError {
    pub(crate) fn unknown(key_id: &KeyId) -> Self {
        KeyError::KeyUnavailable {
            key_id: key_id.clone(),
            reason: Unavailability::Unknown,
        }
    }

    pub(crate) fn revoked(key_id: &KeyId) -> Self {
        KeyError::KeyUnavailable {
            key_id: key_id.clone(),
            reason: Unavailability::Revoked,
        }
    }
}
