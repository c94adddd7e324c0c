use std::collections::BTreeMap;

use kgen_canonical::{
    canonicalizer::Canonicalizer, deterministic_id, hash_bytes, hash_value, stable_bytes,
    CanonicalizationError, Cid, ContentRef, DigestAlg, HygieneReport, HygieneStatus,
    HygieneWarning, ProfileId, Timestamp,
};
use serde::{Serialize, Serializer};
use serde_json::json;

#[test]
fn cid_serializes_to_golden_json() {
    let cid = hash_bytes(b"abc", DigestAlg::Sha256);

    assert_eq!(
        serde_json::to_string(&cid).unwrap(),
        r#"{"alg":"sha256","digest":"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"}"#
    );
    assert_eq!(
        cid.to_string(),
        "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn cid_parse_round_trips_display() {
    let cid = hash_bytes(b"payload", DigestAlg::Sha512);
    let parsed = Cid::parse(&cid.to_string()).unwrap();
    assert_eq!(parsed, cid);
    assert_eq!(parsed.digest.len(), 128);
}

#[test]
fn cid_rejects_uppercase_and_short_digests() {
    let upper = "A".repeat(64);
    assert!(Cid::new(DigestAlg::Sha256, upper).is_err());
    assert!(Cid::new(DigestAlg::Sha256, "abcd").is_err());
    assert!(Cid::parse("md5:abcd").is_err());
}

#[test]
fn hygiene_report_matches_expected_shape() {
    let report = HygieneReport {
        status: HygieneStatus::Lossy,
        warnings: vec![HygieneWarning::at("StrippedField", "meta.timestamp")],
        metrics: BTreeMap::from([("stripped_fields".to_string(), 1)]),
        profile_id: ProfileId::new("example_profile_0001".into()),
    };

    let serialized = serde_json::to_value(&report).unwrap();
    let expected = json!({
        "status": "Lossy",
        "warnings": [{"code": "StrippedField", "path": "meta.timestamp"}],
        "metrics": {"stripped_fields": 1},
        "profile_id": "example_profile_0001"
    });

    assert_eq!(serialized, expected);
}

#[test]
fn canonicalizer_produces_ordered_bytes() {
    let profile = ProfileId::parse("profileid000000001").unwrap();
    let canonicalizer = Canonicalizer::new(profile);
    let value = json!({"b": 1, "a": {"nested": 2}});
    let result = canonicalizer.canonicalize(&value).unwrap();
    assert_eq!(result.bytes, br#"{"a":{"nested":2},"b":1}"#.to_vec());
    assert_eq!(result.report.status, HygieneStatus::Ok);
}

#[test]
fn mappings_in_any_order_share_bytes_and_digest() {
    let first = json!({"b": 2, "a": 1});
    let second = json!({"a": 1, "b": 2});

    assert_eq!(stable_bytes(&first).unwrap(), br#"{"a":1,"b":2}"#.to_vec());
    assert_eq!(stable_bytes(&second).unwrap(), br#"{"a":1,"b":2}"#.to_vec());
    assert_eq!(hash_value(&first).unwrap(), hash_value(&second).unwrap());
}

#[test]
fn keys_sort_by_raw_bytes_not_locale() {
    let value = json!({"b": 0, "B": 0, "a": 0, "é": 0, "Z": 0});
    let bytes = stable_bytes(&value).unwrap();
    assert_eq!(bytes, r#"{"B":0,"Z":0,"a":0,"b":0,"é":0}"#.as_bytes().to_vec());
}

#[test]
fn list_order_is_preserved() {
    let value = json!({"items": [3, 1, 2]});
    assert_eq!(stable_bytes(&value).unwrap(), br#"{"items":[3,1,2]}"#.to_vec());
}

#[test]
fn ignored_fields_are_stripped_at_every_depth() {
    let canonicalizer =
        Canonicalizer::default().with_ignored_fields(["generated_at", "nonce"]);
    let value = json!({
        "name": "report",
        "generated_at": "2026-01-01T00:00:00Z",
        "sections": [{"title": "x", "nonce": 7}],
        "meta": {"nonce": "abc", "owner": "ops"}
    });

    let result = canonicalizer.canonicalize(&value).unwrap();
    assert_eq!(
        result.bytes,
        br#"{"meta":{"owner":"ops"},"name":"report","sections":[{"title":"x"}]}"#.to_vec()
    );
    assert_eq!(result.report.status, HygieneStatus::Lossy);
    assert_eq!(result.report.metrics["stripped_fields"], 3);
    let paths: Vec<_> = result
        .report
        .warnings
        .iter()
        .filter_map(|w| w.path.clone())
        .collect();
    assert!(paths.contains(&"sections[0].nonce".to_string()));
    assert!(paths.contains(&"meta.nonce".to_string()));
}

#[test]
fn stripping_makes_volatile_inputs_hash_equal() {
    let canonicalizer = Canonicalizer::default().with_ignored_fields(["timestamp"]);
    let a = json!({"id": 1, "timestamp": 100});
    let b = json!({"timestamp": 999, "id": 1});
    assert_eq!(
        canonicalizer.hash(&a, DigestAlg::Sha256).unwrap(),
        canonicalizer.hash(&b, DigestAlg::Sha256).unwrap()
    );
}

#[test]
fn numbers_use_fixed_decimal_text() {
    let value = json!({"neg_zero": -0.0, "int_float": 3.0, "half": 0.5, "big": 1e300});
    assert_eq!(
        stable_bytes(&value).unwrap(),
        br#"{"big":1.0e300,"half":0.5,"int_float":3,"neg_zero":0}"#.to_vec()
    );
}

#[test]
fn whole_floats_above_2_pow_53_hash_like_integers() {
    #[derive(Serialize)]
    struct Ints {
        m: u128,
        n: u64,
    }

    let as_float = json!({"n": 9_007_199_254_740_992.0_f64, "m": 1e20});
    let as_int = Ints {
        m: 100_000_000_000_000_000_000,
        n: 9_007_199_254_740_992,
    };
    assert_eq!(
        stable_bytes(&as_float).unwrap(),
        br#"{"m":100000000000000000000,"n":9007199254740992}"#.to_vec()
    );
    assert_eq!(hash_value(&as_float).unwrap(), hash_value(&as_int).unwrap());
}

#[test]
fn non_finite_floats_are_unsupported() {
    #[derive(Serialize)]
    struct Reading {
        value: f64,
    }

    let err = stable_bytes(&Reading { value: f64::NAN }).unwrap_err();
    match err {
        CanonicalizationError::UnsupportedType { path, .. } => assert_eq!(path, "value"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn self_referential_input_is_rejected_as_cyclic() {
    struct Loop;

    impl Serialize for Loop {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("next", &Loop)?;
            map.end()
        }
    }

    let err = stable_bytes(&Loop).unwrap_err();
    assert!(matches!(err, CanonicalizationError::CyclicInput { limit: 128, .. }));
}

#[test]
fn live_handles_are_rejected_with_their_path() {
    struct Handle;

    impl Serialize for Handle {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("file handle cannot be serialized"))
        }
    }

    #[derive(Serialize)]
    struct Job {
        outputs: Vec<Handle>,
    }

    let err = stable_bytes(&Job { outputs: vec![Handle] }).unwrap_err();
    assert_eq!(
        err,
        CanonicalizationError::UnsupportedType {
            path: "outputs[0]".into(),
            reason: "file handle cannot be serialized".into(),
        }
    );
}

#[test]
fn reserved_bytes_key_is_rejected() {
    let err = stable_bytes(&json!({"$bytes": "AAAA"})).unwrap_err();
    assert!(matches!(err, CanonicalizationError::UnsupportedType { .. }));
}

#[test]
fn integer_keys_colliding_with_strings_are_duplicates() {
    let mut map: BTreeMap<u8, &str> = BTreeMap::new();
    map.insert(1, "int");

    #[derive(Serialize)]
    #[serde(untagged)]
    enum Key {
        Int(u8),
        Text(&'static str),
    }

    struct Pairs(Vec<(Key, &'static str)>);

    impl Serialize for Pairs {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
        }
    }

    assert!(stable_bytes(&map).is_ok());
    let pairs = Pairs(vec![(Key::Int(1), "int"), (Key::Text("1"), "text")]);
    assert_eq!(
        stable_bytes(&pairs).unwrap_err(),
        CanonicalizationError::DuplicateKey("1".into())
    );
}

#[test]
fn deterministic_ids_are_short_and_separated() {
    let id = deterministic_id("template", &["report", "v1"]);
    assert_eq!(id.len(), 16);
    assert_eq!(id, deterministic_id("template", &["report", "v1"]));
    assert_ne!(
        deterministic_id("ns", &["ab", "c"]),
        deterministic_id("ns", &["a", "bc"])
    );
    assert_ne!(id, deterministic_id("artifact", &["report", "v1"]));
}

#[test]
fn content_ref_serialization_includes_cid() {
    let content_ref = ContentRef {
        cid: hash_bytes(b"3-1", DigestAlg::Sha256),
        size_bytes: Some(3),
        media_type: Some("text/plain".into()),
    };

    let value = serde_json::to_value(&content_ref).unwrap();
    assert_eq!(value["cid"]["alg"], "sha256");
    assert_eq!(value["size_bytes"], 3);
    assert_eq!(value["media_type"], "text/plain");
}

#[test]
fn timestamps_round_trip_through_unix_seconds() {
    let ts = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
    assert_eq!(ts.as_str(), "2023-11-14T22:13:20Z");
    assert_eq!(ts.unix_seconds().unwrap(), 1_700_000_000);
    assert!(Timestamp::parse(ts.as_str()).is_ok());
}
