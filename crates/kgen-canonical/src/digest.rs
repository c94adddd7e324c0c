use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::canonicalizer::{CanonicalizationError, Canonicalizer};
use crate::validation::ValidationError;

/// Domain separator between `deterministic_id` inputs.
const ID_SEPARATOR: u8 = 0x00;

/// Hex characters kept by [`deterministic_id`].
pub const SHORT_ID_LEN: usize = 16;

/// Supported digest algorithms for content identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlg {
    /// SHA-256 (the default).
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
}

impl DigestAlg {
    /// Name used in CIDs and attestation URIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlg::Sha256 => "sha256",
            DigestAlg::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlg::Sha256 => 64,
            DigestAlg::Sha512 => 128,
        }
    }

    /// Raw digest of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlg::Sha256 => Sha256::digest(bytes).to_vec(),
            DigestAlg::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

impl fmt::Display for DigestAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlg {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" | "sha-256" => Ok(DigestAlg::Sha256),
            "sha512" | "sha-512" => Ok(DigestAlg::Sha512),
            other => Err(ValidationError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Content identifier: algorithm plus lowercase hex digest.
///
/// Displayed and parsed as `<alg>:<hex>`, e.g. `sha256:9f86d0…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid {
    /// Digest algorithm.
    pub alg: DigestAlg,
    /// Lowercase hex digest.
    pub digest: String,
}

impl Cid {
    /// Constructs a validated identifier.
    pub fn new(alg: DigestAlg, digest: impl Into<String>) -> Result<Self, ValidationError> {
        let digest = digest.into();
        if digest.len() != alg.hex_len() {
            return Err(ValidationError::LengthMismatch {
                field: "digest",
                expected: alg.hex_len(),
                actual: digest.len(),
            });
        }
        let re = Regex::new(r"^[0-9a-f]+$").expect("invalid regex");
        if !re.is_match(&digest) {
            return Err(ValidationError::PatternMismatch {
                field: "digest",
                value: digest,
            });
        }
        Ok(Cid { alg, digest })
    }

    /// Parses `<alg>:<hex>`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let (alg, digest) = text
            .split_once(':')
            .ok_or_else(|| ValidationError::PatternMismatch {
                field: "cid",
                value: text.to_string(),
            })?;
        Cid::new(alg.parse()?, digest)
    }

    /// Whether `bytes` hash to this identifier.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        hash_bytes(bytes, self.alg) == *self
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alg, self.digest)
    }
}

impl FromStr for Cid {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse(s)
    }
}

/// Content identifier of raw bytes.
pub fn hash_bytes(bytes: &[u8], alg: DigestAlg) -> Cid {
    Cid {
        alg,
        digest: hex::encode(alg.digest(bytes)),
    }
}

/// Content identifier of the canonical bytes of `value` (default profile, SHA-256).
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<Cid, CanonicalizationError> {
    Canonicalizer::default().hash(value, DigestAlg::Sha256)
}

/// Short human-facing identifier derived from a namespace and parts.
///
/// Computed as `sha256(namespace || 0x00 || part_1 || 0x00 || … part_n)`,
/// hex-encoded and truncated to [`SHORT_ID_LEN`] characters. The separator
/// keeps `("ab", "c")` and `("a", "bc")` apart.
pub fn deterministic_id<S: AsRef<str>>(namespace: &str, parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    for part in parts {
        hasher.update([ID_SEPARATOR]);
        hasher.update(part.as_ref().as_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(SHORT_ID_LEN);
    id
}
