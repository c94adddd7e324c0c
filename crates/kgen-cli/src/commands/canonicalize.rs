//! Canonicalize command implementation.

use kgen_canonical::hash_bytes;
use serde_json::json;

use crate::config::Config;
use crate::output;

pub fn run(
    config: &Config,
    input: Option<String>,
    report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let canonicalizer = config.canonicalizer()?;
    let value = output::read_json(input.as_deref())?;

    let result = canonicalizer
        .canonicalize(&value)
        .map_err(|e| format!("Canonicalization failed: {}", e))?;
    let canonical = String::from_utf8(result.bytes)?;

    if report {
        let cid = hash_bytes(canonical.as_bytes(), config.canonical.digest);
        output::print_json(&json!({
            "canonical": canonical,
            "cid": cid.to_string(),
            "report": result.report,
        }))
    } else {
        println!("{}", canonical);
        Ok(())
    }
}
