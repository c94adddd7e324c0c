use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, TimeZone, Utc};
use kgen_attest::{
    AttestError, AttestationDefaults, AttestationGenerator, AttestationMetadata,
    AttestationResolver, AttestationUri, ResolverOptions, TrustLink, Verdict, ENVELOPE_TYPE,
};
use kgen_canonical::{hash_bytes, hash_value, Cid, DigestAlg, KeyId, Timestamp};
use kgen_keys::{FixedClock, KeyAlgorithm, KeyError, KeyManager, KeyRecord, Unavailability};
use kgen_store::{
    AttestationStore, FileStore, MemoryStore, PutOutcome, StoreError, StoredRecord,
};
use serde_json::json;

struct Fixture {
    clock: Arc<FixedClock>,
    keys: Arc<KeyManager>,
    store: Arc<MemoryStore>,
    key: KeyRecord,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::milliseconds(750),
        ));
        let keys = Arc::new(KeyManager::in_memory(clock.clone()));
        let key = keys.generate_key_pair(KeyAlgorithm::Ed25519, None).unwrap();
        Self {
            clock,
            keys,
            store: Arc::new(MemoryStore::new()),
            key,
        }
    }

    fn defaults(&self) -> AttestationDefaults {
        AttestationDefaults {
            creator: "build-farm".into(),
            key_id: Some(self.key.key_id.clone()),
            compliance_standards: ["SLSA-2".to_string()].into_iter().collect(),
            ..AttestationDefaults::default()
        }
    }

    fn generator(&self) -> AttestationGenerator {
        AttestationGenerator::new(
            self.keys.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.defaults(),
        )
    }

    fn resolver(&self) -> AttestationResolver {
        AttestationResolver::new(
            self.keys.clone(),
            self.store.clone(),
            ResolverOptions::default(),
        )
    }
}

fn subject() -> Cid {
    hash_value(&json!({"artifact": "service.yaml", "version": 3})).unwrap()
}

fn store_raw(store: &MemoryStore, envelope: &str) -> AttestationUri {
    let cid = hash_bytes(envelope.as_bytes(), DigestAlg::Sha256);
    store
        .put(
            &cid,
            &StoredRecord {
                envelope: envelope.to_string(),
                stored_at: Timestamp::from_unix_seconds(1_772_366_400).unwrap(),
            },
        )
        .unwrap();
    AttestationUri::from_cid(cid)
}

#[test]
fn generated_attestations_resolve_as_verified() {
    let fx = Fixture::new();
    let metadata = AttestationMetadata {
        trust_chain: vec![TrustLink {
            entity: "acme".into(),
            role: "issuer".into(),
            level: 0,
        }],
        compliance_standards: ["ISO-27001".to_string()].into_iter().collect(),
        properties: [("pipeline".to_string(), json!("nightly"))].into_iter().collect(),
        ..AttestationMetadata::default()
    };
    let generated = fx.generator().generate(&subject(), metadata).unwrap();
    assert_eq!(generated.outcome, PutOutcome::Inserted);
    assert!(generated.uri.to_string().starts_with("attest://sha256/"));

    let resolution = fx.resolver().resolve(&generated.uri).unwrap();
    assert_eq!(resolution.verdict, Verdict::Verified);
    assert!(resolution.verified);
    assert!(resolution.signature_valid);
    assert_eq!(resolution.attestation, generated.attestation);
    assert_eq!(resolution.attestation.subject(), &subject());
    assert_eq!(resolution.key.as_ref().map(|k| &k.key_id), Some(&fx.key.key_id));
    assert_eq!(resolution.stored_at.as_str(), "2026-03-01T12:00:00Z");

    let claims = &resolution.attestation.claims;
    assert_eq!(claims.creator, "build-farm");
    let standards: Vec<&str> = claims.compliance_standards.iter().map(String::as_str).collect();
    assert_eq!(standards, ["ISO-27001", "SLSA-2"]);
    assert_eq!(claims.trust_chain[0].entity, "acme");
}

#[test]
fn timestamps_are_whole_seconds_with_default_validity() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    let claims = &generated.attestation.claims;
    assert_eq!(claims.created_at.as_str(), "2026-03-01T12:00:00Z");
    assert_eq!(claims.valid_from, claims.created_at);
    assert_eq!(claims.valid_until.as_str(), "2027-03-01T12:00:00Z");
    assert_eq!(claims.iat, claims.created_at.unix_seconds().unwrap());
    assert_eq!(claims.exp, claims.valid_until.unix_seconds().unwrap());
}

#[test]
fn envelope_is_a_three_part_jws() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    let parts: Vec<&str> = generated.envelope.split('.').collect();
    assert_eq!(parts.len(), 3);

    let header: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
    assert_eq!(
        header,
        json!({"alg": "EdDSA", "kid": fx.key.key_id.as_str(), "typ": ENVELOPE_TYPE})
    );
    let header_text = String::from_utf8(URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
    assert!(header_text.starts_with(r#"{"alg":"EdDSA","kid":"#));

    let payload: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    assert!(payload["iat"].is_i64());
    assert!(payload["exp"].is_i64());
    assert_eq!(URL_SAFE_NO_PAD.decode(parts[2]).unwrap().len(), 64);
    assert_eq!(generated.attestation.signature.value, parts[2]);
}

#[test]
fn same_inputs_in_the_same_second_store_one_record() {
    let fx = Fixture::new();
    let generator = fx.generator();
    let first = generator
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    fx.clock.advance(Duration::milliseconds(100));
    let second = generator
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();

    assert_eq!(first.envelope, second.envelope);
    assert_eq!(first.uri, second.uri);
    assert_eq!(second.outcome, PutOutcome::AlreadyPresent);
    assert_eq!(fx.store.len(), 1);

    fx.clock.advance(Duration::seconds(1));
    let later = generator
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    assert_ne!(later.uri, first.uri);
    assert_eq!(fx.store.len(), 2);
}

#[test]
fn rotated_keys_yield_signed_by_revoked_key() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    let successor = fx.keys.rotate(&fx.key.key_id).unwrap();

    let resolution = fx.resolver().resolve(&generated.uri).unwrap();
    assert_eq!(resolution.verdict, Verdict::SignedByRevokedKey);
    assert!(!resolution.verified);
    assert!(resolution.signature_valid);
    match resolution.require_verified() {
        Err(AttestError::VerificationFailed { uri, verdict }) => {
            assert_eq!(uri, generated.uri);
            assert_eq!(verdict, Verdict::SignedByRevokedKey);
        }
        other => panic!("expected VerificationFailed, got {other:?}"),
    }

    match fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
    {
        Err(AttestError::Key(KeyError::KeyUnavailable { reason, .. })) => {
            assert_eq!(reason, Unavailability::Revoked)
        }
        other => panic!("expected KeyUnavailable, got {other:?}"),
    }

    let renewed = fx
        .generator()
        .generate(
            &subject(),
            AttestationMetadata {
                key_id: Some(successor.key_id),
                ..AttestationMetadata::default()
            },
        )
        .unwrap();
    assert!(fx.resolver().resolve(&renewed.uri).unwrap().verified);
}

struct TamperingStore {
    inner: MemoryStore,
}

impl AttestationStore for TamperingStore {
    fn put(&self, cid: &Cid, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        self.inner.put(cid, record)
    }

    fn get(&self, cid: &Cid) -> Result<StoredRecord, StoreError> {
        let mut record = self.inner.get(cid)?;
        record.envelope.push('A');
        Ok(record)
    }

    fn list(&self) -> Result<Vec<Cid>, StoreError> {
        self.inner.list()
    }
}

#[test]
fn tampered_records_are_integrity_mismatches() {
    let fx = Fixture::new();
    let store: Arc<dyn AttestationStore> = Arc::new(TamperingStore {
        inner: MemoryStore::new(),
    });
    let generator = AttestationGenerator::new(
        fx.keys.clone(),
        store.clone(),
        fx.clock.clone(),
        fx.defaults(),
    );
    let generated = generator
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();

    let resolver = AttestationResolver::new(fx.keys.clone(), store, ResolverOptions::default());
    match resolver.resolve(&generated.uri) {
        Err(AttestError::StorageIntegrityMismatch { expected, actual }) => {
            assert_eq!(&expected, generated.uri.cid());
            assert_ne!(actual, expected);
        }
        other => panic!("expected StorageIntegrityMismatch, got {other:?}"),
    }
}

#[test]
fn missing_attestations_are_not_found() {
    let fx = Fixture::new();
    let uri = AttestationUri::from_cid(hash_bytes(b"nothing here", DigestAlg::Sha256));
    match fx.resolver().resolve(&uri) {
        Err(AttestError::NotFound(cid)) => assert_eq!(&cid, uri.cid()),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

struct SlowStore {
    inner: MemoryStore,
    delay: StdDuration,
}

impl AttestationStore for SlowStore {
    fn put(&self, cid: &Cid, record: &StoredRecord) -> Result<PutOutcome, StoreError> {
        thread::sleep(self.delay);
        self.inner.put(cid, record)
    }

    fn get(&self, cid: &Cid) -> Result<StoredRecord, StoreError> {
        thread::sleep(self.delay);
        self.inner.get(cid)
    }

    fn list(&self) -> Result<Vec<Cid>, StoreError> {
        self.inner.list()
    }
}

#[test]
fn slow_stores_time_out() {
    let fx = Fixture::new();
    let store: Arc<dyn AttestationStore> = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: StdDuration::from_millis(500),
    });

    let generator = AttestationGenerator::new(
        fx.keys.clone(),
        store.clone(),
        fx.clock.clone(),
        AttestationDefaults {
            store_timeout: Some(StdDuration::from_millis(20)),
            ..fx.defaults()
        },
    );
    assert!(matches!(
        generator.generate(&subject(), AttestationMetadata::default()),
        Err(AttestError::Timeout {
            operation: "put",
            ..
        })
    ));

    let resolver = AttestationResolver::new(
        fx.keys.clone(),
        store,
        ResolverOptions {
            fetch_timeout: Some(StdDuration::from_millis(20)),
        },
    );
    let uri = AttestationUri::from_cid(hash_bytes(b"anything", DigestAlg::Sha256));
    assert!(matches!(
        resolver.resolve(&uri),
        Err(AttestError::Timeout {
            operation: "get",
            ..
        })
    ));
}

#[test]
fn garbage_envelopes_are_malformed() {
    let fx = Fixture::new();
    for garbage in ["not an envelope", "a.b", "!!.??.##", "e30.e30.AAAA"] {
        let uri = store_raw(&fx.store, garbage);
        assert!(
            matches!(
                fx.resolver().resolve(&uri),
                Err(AttestError::MalformedEnvelope(_))
            ),
            "{garbage}"
        );
    }
}

#[test]
fn keys_unknown_to_the_resolver_are_reported() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();

    let stranger = Arc::new(KeyManager::in_memory(fx.clock.clone()));
    let resolver = AttestationResolver::new(stranger, fx.store.clone(), ResolverOptions::default());
    let resolution = resolver.resolve(&generated.uri).unwrap();
    assert_eq!(resolution.verdict, Verdict::UnknownKey);
    assert!(!resolution.signature_valid);
    assert!(resolution.key.is_none());
    assert_eq!(resolution.attestation.signature.key_id, fx.key.key_id);
}

#[test]
fn forged_signatures_are_invalid() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    let other = fx.keys.generate_key_pair(KeyAlgorithm::Ed25519, None).unwrap();

    let (signing_input, _) = generated.envelope.rsplit_once('.').unwrap();
    let forged_sig = fx.keys.sign(&other.key_id, signing_input.as_bytes()).unwrap();
    let forged = format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(&forged_sig.value)
    );
    let resolution = fx.resolver().resolve(&store_raw(&fx.store, &forged)).unwrap();
    assert_eq!(resolution.verdict, Verdict::InvalidSignature);
    assert!(!resolution.signature_valid);
}

#[test]
fn header_algorithm_must_match_the_key() {
    let fx = Fixture::new();
    let generated = fx
        .generator()
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    let parts: Vec<&str> = generated.envelope.split('.').collect();
    let header = format!(
        r#"{{"alg":"RS256","kid":"{}","typ":"{}"}}"#,
        fx.key.key_id, ENVELOPE_TYPE
    );
    let swapped = format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        parts[1],
        parts[2]
    );
    let resolution = fx.resolver().resolve(&store_raw(&fx.store, &swapped)).unwrap();
    assert_eq!(resolution.verdict, Verdict::InvalidSignature);
}

#[test]
fn validity_windows_are_checked() {
    let fx = Fixture::new();
    let start = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
    let generated = fx
        .generator()
        .generate(
            &subject(),
            AttestationMetadata {
                valid_from: Some(start),
                validity: Some(Duration::days(30)),
                ..AttestationMetadata::default()
            },
        )
        .unwrap();
    assert_eq!(
        generated.attestation.claims.valid_until.as_str(),
        "2026-05-01T00:00:00Z"
    );

    let resolution = fx.resolver().resolve(&generated.uri).unwrap();
    assert!(!resolution.is_within_validity(start - Duration::seconds(1)).unwrap());
    assert!(resolution.is_within_validity(start).unwrap());
    assert!(resolution.is_within_validity(start + Duration::days(30)).unwrap());
    assert!(!resolution
        .is_within_validity(start + Duration::days(31))
        .unwrap());

    assert!(matches!(
        fx.generator().generate(
            &subject(),
            AttestationMetadata {
                valid_from: Some(start),
                valid_until: Some(start - Duration::days(1)),
                ..AttestationMetadata::default()
            },
        ),
        Err(AttestError::InvalidMetadata(_))
    ));
}

#[test]
fn a_signing_key_is_required() {
    let fx = Fixture::new();
    let generator = AttestationGenerator::new(
        fx.keys.clone(),
        fx.store.clone(),
        fx.clock.clone(),
        AttestationDefaults::default(),
    );
    assert!(matches!(
        generator.generate(&subject(), AttestationMetadata::default()),
        Err(AttestError::InvalidMetadata(_))
    ));
    assert!(matches!(
        generator.generate(
            &subject(),
            AttestationMetadata {
                key_id: Some(KeyId::parse("missing").unwrap()),
                ..AttestationMetadata::default()
            },
        ),
        Err(AttestError::Key(KeyError::KeyUnavailable {
            reason: Unavailability::Unknown,
            ..
        }))
    ));
}

#[test]
fn uris_parse_and_print() {
    let cid = hash_bytes(b"x", DigestAlg::Sha256);
    let text = format!("attest://sha256/{}", cid.digest);
    let uri = AttestationUri::parse(&text).unwrap();
    assert_eq!(uri.cid(), &cid);
    assert_eq!(uri.to_string(), text);
    assert_eq!(serde_json::to_value(&uri).unwrap(), json!(text));

    for bad in [
        "sha256:abc",
        "attest://sha256",
        "attest://md5/00",
        "attest://sha256/XYZ",
        "http://sha256/00",
    ] {
        assert!(matches!(
            AttestationUri::parse(bad),
            Err(AttestError::InvalidUri(_))
        ));
    }

    let fx = Fixture::new();
    assert!(matches!(
        fx.resolver().resolve_str("attest://nope"),
        Err(AttestError::InvalidUri(_))
    ));
}

#[test]
fn rsa_and_sha512_attestations_resolve_from_a_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let fx = Fixture::new();
    let rsa = fx.keys.generate_key_pair(KeyAlgorithm::Rsa2048, None).unwrap();
    let store: Arc<dyn AttestationStore> = Arc::new(FileStore::open(dir.path()).unwrap());

    let generator = AttestationGenerator::new(
        fx.keys.clone(),
        store.clone(),
        fx.clock.clone(),
        AttestationDefaults {
            key_id: Some(rsa.key_id.clone()),
            digest_alg: DigestAlg::Sha512,
            compliance_standards: BTreeSet::new(),
            ..fx.defaults()
        },
    );
    let generated = generator
        .generate(&subject(), AttestationMetadata::default())
        .unwrap();
    assert!(generated.uri.to_string().starts_with("attest://sha512/"));

    let resolver = AttestationResolver::new(fx.keys.clone(), store, ResolverOptions::default());
    let resolution = resolver.resolve_str(&generated.uri.to_string()).unwrap();
    assert_eq!(resolution.verdict, Verdict::Verified);
    assert_eq!(resolution.attestation.signature.algorithm, KeyAlgorithm::Rsa2048);
}

#[test]
fn concurrent_generation_of_one_attestation_stores_it_once() {
    let fx = Fixture::new();
    let generator = fx.generator();
    let outcomes: Vec<PutOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    generator
                        .generate(&subject(), AttestationMetadata::default())
                        .unwrap()
                        .outcome
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == PutOutcome::Inserted)
            .count(),
        1
    );
    assert_eq!(fx.store.len(), 1);
}
