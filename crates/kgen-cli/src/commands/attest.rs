//! Attest command implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kgen_attest::{AttestationGenerator, AttestationMetadata, TrustLink};
use kgen_canonical::{Cid, KeyId};
use kgen_keys::{KeyManager, SystemClock};
use kgen_store::PutOutcome;
use serde_json::{json, Value};

use super::{open_keys, open_store};
use crate::config::Config;
use crate::output;

pub struct AttestArgs {
    pub subject: String,
    pub key: Option<String>,
    pub creator: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub validity_days: Option<i64>,
    pub standards: Vec<String>,
    pub trust_chain: Vec<String>,
    pub properties: Vec<String>,
}

pub fn run(config: &Config, args: AttestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let subject = Cid::parse(&args.subject)
        .map_err(|e| format!("Invalid subject {}: {}", args.subject, e))?;
    let metadata = AttestationMetadata {
        creator: args.creator,
        key_id: args.key.map(KeyId::parse).transpose()?,
        valid_from: args.valid_from.as_deref().map(parse_instant).transpose()?,
        valid_until: args.valid_until.as_deref().map(parse_instant).transpose()?,
        validity: args.validity_days.map(Duration::days),
        trust_chain: args
            .trust_chain
            .iter()
            .map(String::as_str)
            .map(parse_trust_link)
            .collect::<Result<_, _>>()?,
        compliance_standards: args.standards.into_iter().collect(),
        properties: parse_properties(&args.properties)?,
    };

    let keys: Arc<KeyManager> = open_keys(config)?;
    let generator = AttestationGenerator::new(
        keys.clone(),
        open_store(config)?,
        Arc::new(SystemClock),
        config.attestation_defaults()?,
    );
    let generated = generator.generate(&subject, metadata)?;
    keys.flush()?;

    output::print_json(&json!({
        "uri": generated.uri,
        "outcome": match generated.outcome {
            PutOutcome::Inserted => "inserted",
            PutOutcome::AlreadyPresent => "already_present",
        },
        "attestation": generated.attestation,
    }))
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp {}: {}", text, e))
}

fn parse_trust_link(text: &str) -> Result<TrustLink, String> {
    let invalid = || format!("Invalid trust link {} (expected entity:role:level)", text);
    let mut parts = text.rsplitn(3, ':');
    let level = parts.next().ok_or_else(invalid)?;
    let role = parts.next().ok_or_else(invalid)?;
    let entity = parts.next().ok_or_else(invalid)?;
    if entity.is_empty() || role.is_empty() {
        return Err(invalid());
    }
    Ok(TrustLink {
        entity: entity.to_string(),
        role: role.to_string(),
        level: level.parse().map_err(|_| invalid())?,
    })
}

fn parse_properties(pairs: &[String]) -> Result<BTreeMap<String, Value>, String> {
    let mut properties = BTreeMap::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid property {} (expected key=value)", pair))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}
