//! Graph command implementation.

use kgen_canonical::DigestAlg;
use kgen_graph::{parse_ntriples, GraphCanonicalizer};
use serde_json::json;

use crate::config::Config;
use crate::output;

pub fn run(
    config: &Config,
    input: Option<String>,
    max_rounds: Option<usize>,
    alg: Option<DigestAlg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = output::read_input(input.as_deref())?;
    let triples = parse_ntriples(&text).map_err(|e| format!("Invalid N-Triples: {}", e))?;

    let mut canonicalizer = GraphCanonicalizer::new();
    if let Some(rounds) = max_rounds {
        canonicalizer = canonicalizer.with_max_rounds(rounds);
    }
    let graph = canonicalizer.canonicalize(&triples);
    if graph.approximate {
        tracing::warn!(rounds = graph.rounds, "blank node labels are approximate");
    }

    let cid = graph.cid(alg.unwrap_or(config.canonical.digest));
    output::print_json(&json!({
        "cid": cid.to_string(),
        "triples": graph.triples,
        "blank_node_map": graph.blank_node_map,
        "rounds": graph.rounds,
        "approximate": graph.approximate,
    }))
}
