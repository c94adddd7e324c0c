//! Resolve command implementation.

use chrono::{DateTime, Utc};
use kgen_attest::AttestationResolver;
use serde_json::json;

use super::{open_keys, open_store};
use crate::config::Config;
use crate::output;

/// Exit status when resolution succeeds but the attestation is not trusted.
pub const EXIT_NOT_VERIFIED: i32 = 2;

pub fn run(
    config: &Config,
    uri: String,
    at: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = AttestationResolver::new(
        open_keys(config)?,
        open_store(config)?,
        config.resolver_options(),
    );
    let resolution = resolver.resolve_str(&uri)?;

    let within_validity = match at {
        Some(text) => {
            let at = DateTime::parse_from_rfc3339(&text)
                .map_err(|e| format!("Invalid timestamp {}: {}", text, e))?
                .with_timezone(&Utc);
            Some(resolution.is_within_validity(at)?)
        }
        None => None,
    };

    let mut report = serde_json::to_value(&resolution)?;
    if let (Some(valid), Some(map)) = (within_validity, report.as_object_mut()) {
        map.insert("within_validity".into(), json!(valid));
    }
    output::print_json(&report)?;

    if !resolution.verified || within_validity == Some(false) {
        std::process::exit(EXIT_NOT_VERIFIED);
    }
    Ok(())
}
