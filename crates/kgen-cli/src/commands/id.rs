//! Id command implementation.

use kgen_canonical::deterministic_id;
use serde_json::json;

use crate::output;

pub fn run(namespace: String, parts: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let id = deterministic_id(&namespace, &parts);
    output::print_json(&json!({ "namespace": namespace, "id": id }))
}
