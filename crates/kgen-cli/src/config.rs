//! `kgen.toml` configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kgen_attest::{AttestationDefaults, ResolverOptions, DEFAULT_VALIDITY_DAYS};
use kgen_canonical::{Canonicalizer, DigestAlg, KeyId, ProfileId, DEFAULT_PROFILE};
use kgen_keys::KeyAlgorithm;
use serde::Deserialize;
use thiserror::Error;

/// File looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "kgen.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Config location.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid TOML for this schema.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config location.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: toml::de::Error,
    },
    /// A value failed validation.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub canonical: CanonicalConfig,
    pub keys: KeysConfig,
    pub store: StoreConfig,
    pub attestation: AttestationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanonicalConfig {
    pub profile: String,
    pub ignored_fields: Vec<String>,
    pub digest: DigestAlg,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            ignored_fields: Vec::new(),
            digest: DigestAlg::Sha256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysConfig {
    pub path: PathBuf,
    pub algorithm: KeyAlgorithm,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".kgen/keystore.json"),
            algorithm: KeyAlgorithm::Ed25519,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".kgen/attestations"),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttestationConfig {
    pub creator: String,
    pub validity_days: i64,
    pub compliance_standards: BTreeSet<String>,
    pub key_id: Option<String>,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            creator: "kgen".to_string(),
            validity_days: DEFAULT_VALIDITY_DAYS,
            compliance_standards: BTreeSet::new(),
            key_id: None,
        }
    }
}

impl Config {
    /// Loads `explicit`, else `kgen.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn canonicalizer(&self) -> Result<Canonicalizer, ConfigError> {
        let profile = ProfileId::parse(self.canonical.profile.clone())
            .map_err(|e| ConfigError::Invalid(format!("canonical.profile: {}", e)))?;
        Ok(Canonicalizer::new(profile).with_ignored_fields(self.canonical.ignored_fields.clone()))
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store.timeout_ms.map(Duration::from_millis)
    }

    pub fn attestation_defaults(&self) -> Result<AttestationDefaults, ConfigError> {
        if self.attestation.validity_days < 0 {
            return Err(ConfigError::Invalid(
                "attestation.validity_days must not be negative".into(),
            ));
        }
        let key_id = self
            .attestation
            .key_id
            .as_deref()
            .map(|id| {
                KeyId::parse(id)
                    .map_err(|e| ConfigError::Invalid(format!("attestation.key_id: {}", e)))
            })
            .transpose()?;
        Ok(AttestationDefaults {
            creator: self.attestation.creator.clone(),
            key_id,
            validity: chrono::Duration::days(self.attestation.validity_days),
            compliance_standards: self.attestation.compliance_standards.clone(),
            digest_alg: self.canonical.digest,
            store_timeout: self.store_timeout(),
        })
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            fetch_timeout: self.store_timeout(),
        }
    }
}
