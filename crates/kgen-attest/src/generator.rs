//! Signing and storing attestations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Timelike, Utc};
use kgen_canonical::{hash_bytes, Canonicalizer, Cid, DigestAlg, KeyId, Timestamp};
use kgen_keys::{Clock, KeyRing};
use kgen_store::{AttestationStore, PutOutcome, StoredRecord};
use tracing::{debug, info};

use crate::attestation::{Attestation, AttestationClaims, AttestationSignature, TrustLink};
use crate::boundary::call_store;
use crate::envelope::{JwsHeader, UnsignedEnvelope};
use crate::error::AttestError;
use crate::uri::AttestationUri;

/// Validity applied when neither metadata nor defaults set one.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Values used when metadata leaves a field unset.
#[derive(Debug, Clone)]
pub struct AttestationDefaults {
    /// Creating entity.
    pub creator: String,
    /// Signing key.
    pub key_id: Option<KeyId>,
    /// Length of the validity window.
    pub validity: Duration,
    /// Standards added to every attestation.
    pub compliance_standards: BTreeSet<String>,
    /// Digest algorithm of attestation identifiers.
    pub digest_alg: DigestAlg,
    /// Deadline for store writes.
    pub store_timeout: Option<StdDuration>,
}

impl Default for AttestationDefaults {
    fn default() -> Self {
        Self {
            creator: "kgen".to_string(),
            key_id: None,
            validity: Duration::days(DEFAULT_VALIDITY_DAYS),
            compliance_standards: BTreeSet::new(),
            digest_alg: DigestAlg::Sha256,
            store_timeout: None,
        }
    }
}

/// Per-attestation input.
#[derive(Debug, Clone, Default)]
pub struct AttestationMetadata {
    /// Overrides the default creator.
    pub creator: Option<String>,
    /// Overrides the default signing key.
    pub key_id: Option<KeyId>,
    /// Start of validity; defaults to the signing time.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity; defaults to `valid_from` plus the validity window.
    pub valid_until: Option<DateTime<Utc>>,
    /// Overrides the default validity window.
    pub validity: Option<Duration>,
    /// Chain of vouching entities.
    pub trust_chain: Vec<TrustLink>,
    /// Unioned with the default standards.
    pub compliance_standards: BTreeSet<String>,
    /// Free-form properties.
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A signed and stored attestation.
#[derive(Debug, Clone)]
pub struct GeneratedAttestation {
    /// Reference to the stored envelope.
    pub uri: AttestationUri,
    /// The attestation.
    pub attestation: Attestation,
    /// Compact JWS envelope.
    pub envelope: String,
    /// Whether this call stored the envelope.
    pub outcome: PutOutcome,
}

/// Produces signed attestations for content identifiers.
pub struct AttestationGenerator {
    keys: Arc<dyn KeyRing>,
    store: Arc<dyn AttestationStore>,
    clock: Arc<dyn Clock>,
    defaults: AttestationDefaults,
    canonicalizer: Canonicalizer,
}

impl AttestationGenerator {
    /// Generator signing through `keys` and writing to `store`.
    pub fn new(
        keys: Arc<dyn KeyRing>,
        store: Arc<dyn AttestationStore>,
        clock: Arc<dyn Clock>,
        defaults: AttestationDefaults,
    ) -> Self {
        Self {
            keys,
            store,
            clock,
            defaults,
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Active defaults.
    pub fn defaults(&self) -> &AttestationDefaults {
        &self.defaults
    }

    /// Signs an attestation about `subject` and stores it.
    pub fn generate(
        &self,
        subject: &Cid,
        metadata: AttestationMetadata,
    ) -> Result<GeneratedAttestation, AttestError> {
        let key_id = metadata
            .key_id
            .clone()
            .or_else(|| self.defaults.key_id.clone())
            .ok_or_else(|| AttestError::InvalidMetadata("no signing key configured".into()))?;
        let key = self.keys.record(&key_id)?;

        let claims = self.claims(subject, metadata)?;
        let unsigned = UnsignedEnvelope::new(
            JwsHeader::new(key.algorithm, key_id.clone()),
            &claims,
            &self.canonicalizer,
        )?;
        let signature = self.keys.sign(&key_id, unsigned.signing_input())?;
        let envelope = unsigned.seal(&signature);

        let cid = hash_bytes(envelope.as_bytes(), self.defaults.digest_alg);
        let record = StoredRecord {
            envelope: envelope.clone(),
            stored_at: claims.created_at.clone(),
        };
        let outcome = {
            let cid = cid.clone();
            call_store(&self.store, self.defaults.store_timeout, "put", move |store| {
                store.put(&cid, &record)
            })?
        };

        let uri = AttestationUri::from_cid(cid);
        match outcome {
            PutOutcome::Inserted => {
                info!(%uri, subject = %subject, key_id = %key_id, "stored attestation")
            }
            PutOutcome::AlreadyPresent => debug!(%uri, "attestation already stored"),
        }

        Ok(GeneratedAttestation {
            uri,
            attestation: Attestation {
                claims,
                signature: AttestationSignature {
                    key_id,
                    algorithm: signature.algorithm,
                    value: URL_SAFE_NO_PAD.encode(&signature.value),
                },
            },
            envelope,
            outcome,
        })
    }

    fn claims(
        &self,
        subject: &Cid,
        metadata: AttestationMetadata,
    ) -> Result<AttestationClaims, AttestError> {
        let now = whole_seconds(self.clock.now());
        let created_at = Timestamp::from_datetime(now);

        let valid_from = whole_seconds(metadata.valid_from.unwrap_or(now));
        let validity = metadata.validity.unwrap_or(self.defaults.validity);
        let valid_until = match metadata.valid_until {
            Some(until) => whole_seconds(until),
            None => valid_from
                .checked_add_signed(validity)
                .ok_or_else(|| AttestError::InvalidMetadata("validity out of range".into()))?,
        };
        if valid_until < valid_from {
            return Err(AttestError::InvalidMetadata(format!(
                "valid_until {} precedes valid_from {}",
                valid_until, valid_from
            )));
        }

        let creator = metadata
            .creator
            .unwrap_or_else(|| self.defaults.creator.clone());
        if creator.trim().is_empty() {
            return Err(AttestError::InvalidMetadata("empty creator".into()));
        }

        let mut compliance_standards = self.defaults.compliance_standards.clone();
        compliance_standards.extend(metadata.compliance_standards);

        Ok(AttestationClaims {
            subject_cid: subject.clone(),
            creator,
            iat: now.timestamp(),
            exp: valid_until.timestamp(),
            created_at,
            valid_from: Timestamp::from_datetime(valid_from),
            valid_until: Timestamp::from_datetime(valid_until),
            trust_chain: metadata.trust_chain,
            compliance_standards,
            properties: metadata.properties,
        })
    }
}

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}
