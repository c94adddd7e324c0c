//! Fetching and verifying attestations by URI.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kgen_canonical::{hash_bytes, Timestamp};
use kgen_keys::{
    verify_signature, KeyAlgorithm, KeyError, KeyRecord, KeyRing, KeyStatus, Unavailability,
};
use kgen_store::AttestationStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attestation::{Attestation, AttestationSignature};
use crate::boundary::call_store;
use crate::envelope::DecodedEnvelope;
use crate::error::AttestError;
use crate::uri::AttestationUri;

/// Resolver settings.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Deadline for store reads.
    pub fetch_timeout: Option<Duration>,
}

/// Trust outcome of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Valid signature by an active key.
    Verified,
    /// Valid signature by a key that has since been revoked.
    SignedByRevokedKey,
    /// Signature does not match, or the header names another algorithm.
    InvalidSignature,
    /// The signing key is not known to the key manager.
    UnknownKey,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Verified => "verified",
            Verdict::SignedByRevokedKey => "signed by revoked key",
            Verdict::InvalidSignature => "invalid signature",
            Verdict::UnknownKey => "unknown key",
        })
    }
}

/// A fetched attestation and its trust outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Resolved URI.
    pub uri: AttestationUri,
    /// Decoded attestation.
    pub attestation: Attestation,
    /// When the envelope was stored.
    pub stored_at: Timestamp,
    /// Signing key, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyRecord>,
    /// Trust outcome.
    pub verdict: Verdict,
    /// `verdict == Verified`.
    pub verified: bool,
    /// Signature is cryptographically valid, whatever the key status.
    pub signature_valid: bool,
}

impl Resolution {
    fn new(
        uri: AttestationUri,
        attestation: Attestation,
        stored_at: Timestamp,
        key: Option<KeyRecord>,
        verdict: Verdict,
    ) -> Self {
        Self {
            uri,
            attestation,
            stored_at,
            key,
            verdict,
            verified: verdict == Verdict::Verified,
            signature_valid: matches!(verdict, Verdict::Verified | Verdict::SignedByRevokedKey),
        }
    }

    /// Fails with `VerificationFailed` unless the verdict is `Verified`.
    pub fn require_verified(self) -> Result<Self, AttestError> {
        if self.verified {
            Ok(self)
        } else {
            Err(AttestError::VerificationFailed {
                uri: self.uri,
                verdict: self.verdict,
            })
        }
    }

    /// Whether `at` falls inside the attestation's validity window.
    pub fn is_within_validity(&self, at: DateTime<Utc>) -> Result<bool, AttestError> {
        self.attestation.is_within_validity(at)
    }
}

/// Resolves `attest://` URIs against a store and a key ring.
pub struct AttestationResolver {
    keys: Arc<dyn KeyRing>,
    store: Arc<dyn AttestationStore>,
    options: ResolverOptions,
}

impl AttestationResolver {
    /// Resolver reading from `store` and checking keys in `keys`.
    pub fn new(
        keys: Arc<dyn KeyRing>,
        store: Arc<dyn AttestationStore>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            keys,
            store,
            options,
        }
    }

    /// Parses `uri` and resolves it.
    pub fn resolve_str(&self, uri: &str) -> Result<Resolution, AttestError> {
        self.resolve(&AttestationUri::parse(uri)?)
    }

    /// Fetches, checks integrity, decodes and verifies.
    ///
    /// Untrusted signatures are reported through [`Verdict`], not as errors.
    pub fn resolve(&self, uri: &AttestationUri) -> Result<Resolution, AttestError> {
        let record = {
            let cid = uri.cid().clone();
            call_store(&self.store, self.options.fetch_timeout, "get", move |store| {
                store.get(&cid)
            })?
        };

        let actual = hash_bytes(record.envelope.as_bytes(), uri.alg());
        if &actual != uri.cid() {
            warn!(%uri, actual = %actual, "storage integrity mismatch");
            return Err(AttestError::StorageIntegrityMismatch {
                expected: uri.cid().clone(),
                actual,
            });
        }

        let decoded = DecodedEnvelope::decode(&record.envelope)?;
        let header_alg = KeyAlgorithm::from_jws_alg(&decoded.header.alg).ok_or_else(|| {
            AttestError::MalformedEnvelope(format!("unsupported alg {}", decoded.header.alg))
        })?;
        let attestation = Attestation {
            claims: decoded.claims.clone(),
            signature: AttestationSignature {
                key_id: decoded.header.kid.clone(),
                algorithm: header_alg,
                value: decoded.signature_b64(),
            },
        };

        let key = match self.keys.record(&decoded.header.kid) {
            Ok(key) => key,
            Err(KeyError::KeyUnavailable {
                reason: Unavailability::Unknown,
                ..
            }) => {
                debug!(%uri, key_id = %decoded.header.kid, "signing key unknown");
                return Ok(Resolution::new(
                    uri.clone(),
                    attestation,
                    record.stored_at,
                    None,
                    Verdict::UnknownKey,
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let verdict = if key.algorithm != header_alg {
            Verdict::InvalidSignature
        } else if !verify_signature(
            key.algorithm,
            &key.public_key_bytes()?,
            decoded.signing_input(),
            &decoded.signature,
        )? {
            Verdict::InvalidSignature
        } else if key.status == KeyStatus::Revoked {
            warn!(%uri, key_id = %key.key_id, "attestation signed by revoked key");
            Verdict::SignedByRevokedKey
        } else {
            Verdict::Verified
        };
        debug!(%uri, %verdict, "resolved attestation");

        Ok(Resolution::new(
            uri.clone(),
            attestation,
            record.stored_at,
            Some(key),
            verdict,
        ))
    }
}
