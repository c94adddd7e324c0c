//! Subcommand implementations.

use std::sync::Arc;

use kgen_keys::{KeyManager, SystemClock};
use kgen_store::FileStore;

use crate::config::Config;

pub mod attest;
pub mod canonicalize;
pub mod graph;
pub mod hash;
pub mod id;
pub mod keys;
pub mod render;
pub mod resolve;

pub(crate) fn open_keys(config: &Config) -> Result<Arc<KeyManager>, Box<dyn std::error::Error>> {
    let keys = KeyManager::open(&config.keys.path, Arc::new(SystemClock))
        .map_err(|e| format!("Failed to open keystore {}: {}", config.keys.path.display(), e))?;
    Ok(Arc::new(keys))
}

pub(crate) fn open_store(config: &Config) -> Result<Arc<FileStore>, Box<dyn std::error::Error>> {
    let store = FileStore::open(&config.store.dir)
        .map_err(|e| format!("Failed to open store {}: {}", config.store.dir.display(), e))?;
    Ok(Arc::new(store))
}
