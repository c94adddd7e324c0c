//! Hash command implementation.

use kgen_canonical::{hash_bytes, DigestAlg};
use serde_json::{json, Value};

use crate::config::Config;
use crate::output;

pub fn run(
    config: &Config,
    input: Option<String>,
    alg: Option<DigestAlg>,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let alg = alg.unwrap_or(config.canonical.digest);
    let text = output::read_input(input.as_deref())?;

    let cid = if raw {
        hash_bytes(text.as_bytes(), alg)
    } else {
        let value: Value =
            serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {}", e))?;
        config
            .canonicalizer()?
            .hash(&value, alg)
            .map_err(|e| format!("Canonicalization failed: {}", e))?
    };

    output::print_json(&json!({ "cid": cid.to_string(), "alg": alg, "digest": cid.digest }))
}
