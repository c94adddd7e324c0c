use std::time::Duration;

use kgen_canonical::{CanonicalizationError, Cid, ValidationError};
use kgen_keys::KeyError;
use kgen_store::StoreError;
use thiserror::Error;

use crate::resolver::Verdict;
use crate::uri::AttestationUri;

/// Errors from generating or resolving attestations.
#[derive(Error, Debug)]
pub enum AttestError {
    /// Nothing is stored under the requested identifier.
    #[error("attestation not found: {0}")]
    NotFound(Cid),
    /// Store call did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Store operation (`put` or `get`).
        operation: &'static str,
        /// Configured limit.
        after: Duration,
    },
    /// Fetched bytes hash to a different identifier than requested.
    #[error("storage integrity mismatch: expected {expected}, fetched bytes hash to {actual}")]
    StorageIntegrityMismatch {
        /// Identifier from the URI.
        expected: Cid,
        /// Identifier of the fetched bytes.
        actual: Cid,
    },
    /// Stored envelope is not a valid signed attestation.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// Resolution succeeded but the signature is not trusted.
    #[error("verification failed for {uri}: {verdict}")]
    VerificationFailed {
        /// Resolved URI.
        uri: AttestationUri,
        /// Why it is not trusted.
        verdict: Verdict,
    },
    /// Text is not an `attest://` URI.
    #[error("invalid attestation uri: {0}")]
    InvalidUri(String),
    /// Metadata cannot produce a valid attestation.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    /// Key manager failure, including `KeyUnavailable`.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Claims could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
    /// Timestamp or identifier failed validation.
    #[error("validation error: {0}")]
    Invalid(#[from] ValidationError),
    /// Store failure other than a miss.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AttestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(cid) => AttestError::NotFound(cid),
            other => AttestError::Store(other),
        }
    }
}
