//! Render command implementation.

use std::io::Write;

use kgen_canonical::DigestAlg;
use kgen_render::{FunctionTable, Renderer};
use serde_json::json;

use crate::config::Config;
use crate::output;

pub fn run(
    config: &Config,
    template: String,
    context: Option<String>,
    alg: Option<DigestAlg>,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(&template)
        .map_err(|e| format!("Failed to read template {}: {}", template, e))?;
    let context = output::read_json(context.as_deref())?;

    let renderer =
        Renderer::new(FunctionTable::standard()).with_canonicalizer(config.canonicalizer()?);
    let (bytes, cid) = renderer
        .render_with_cid(&source, &context, alg.unwrap_or(config.canonical.digest))
        .map_err(|e| format!("Render failed: {}", e))?;

    if raw {
        std::io::stdout().write_all(&bytes)?;
        return Ok(());
    }
    output::print_json(&json!({
        "cid": cid.to_string(),
        "output": String::from_utf8(bytes)?,
    }))
}
