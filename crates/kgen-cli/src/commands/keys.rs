//! Key management commands.

use kgen_canonical::KeyId;
use kgen_keys::KeyAlgorithm;

use super::open_keys;
use crate::config::Config;
use crate::output;

pub fn generate(
    config: &Config,
    algorithm: Option<KeyAlgorithm>,
    id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = open_keys(config)?;
    let key_id = id.map(KeyId::parse).transpose()?;
    let record = keys.generate_key_pair(algorithm.unwrap_or(config.keys.algorithm), key_id)?;
    output::print_json(&record)
}

pub fn list(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let keys = open_keys(config)?;
    output::print_json(&keys.list_keys()?)
}

pub fn rotate(config: &Config, key_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let keys = open_keys(config)?;
    let successor = keys.rotate(&KeyId::parse(key_id)?)?;
    output::print_json(&successor)
}

pub fn revoke(config: &Config, key_id: String) -> Result<(), Box<dyn std::error::Error>> {
    let keys = open_keys(config)?;
    let record = keys.revoke(&KeyId::parse(key_id)?)?;
    output::print_json(&record)
}
