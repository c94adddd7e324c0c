//! Attestation records and the claims they sign.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use kgen_canonical::{Cid, KeyId, Timestamp};
use kgen_keys::KeyAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::AttestError;

/// One entity vouching for the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLink {
    /// Who vouches, e.g. an organisation or service name.
    pub entity: String,
    /// Role in the chain, e.g. `issuer` or `reviewer`.
    pub role: String,
    /// Trust level, 0 being the root.
    pub level: u32,
}

/// Signed claims carried in the envelope payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationClaims {
    /// Artifact the attestation is about.
    pub subject_cid: Cid,
    /// Creating entity.
    pub creator: String,
    /// Signing time, whole seconds.
    pub created_at: Timestamp,
    /// Start of the validity window.
    pub valid_from: Timestamp,
    /// End of the validity window.
    pub valid_until: Timestamp,
    /// Chain of vouching entities.
    #[serde(default)]
    pub trust_chain: Vec<TrustLink>,
    /// Standards the subject complies with.
    #[serde(default)]
    pub compliance_standards: BTreeSet<String>,
    /// Free-form properties.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Signature block of an attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationSignature {
    /// Signing key.
    pub key_id: KeyId,
    /// Signing algorithm.
    pub algorithm: KeyAlgorithm,
    /// Signature bytes (base64url-no-pad).
    pub value: String,
}

/// A signed statement about an artifact. Immutable once signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Signed claims.
    #[serde(flatten)]
    pub claims: AttestationClaims,
    /// Signature over the envelope.
    pub signature: AttestationSignature,
}

impl Attestation {
    /// Artifact the attestation is about.
    pub fn subject(&self) -> &Cid {
        &self.claims.subject_cid
    }

    /// Whether `at` falls inside `[valid_from, valid_until]`.
    pub fn is_within_validity(&self, at: DateTime<Utc>) -> Result<bool, AttestError> {
        let from = self.claims.valid_from.to_datetime()?;
        let until = self.claims.valid_until.to_datetime()?;
        Ok(from <= at && at <= until)
    }
}
