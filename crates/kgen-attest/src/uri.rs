use std::fmt;
use std::str::FromStr;

use kgen_canonical::{Cid, DigestAlg};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AttestError;

/// URI scheme of attestation references.
pub const SCHEME: &str = "attest://";

/// `attest://<algorithm>/<lowercase hex digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttestationUri {
    cid: Cid,
}

impl AttestationUri {
    /// URI for the attestation whose envelope hashes to `cid`.
    pub fn from_cid(cid: Cid) -> Self {
        Self { cid }
    }

    /// Parses `attest://sha256/<hex>`.
    pub fn parse(text: &str) -> Result<Self, AttestError> {
        let invalid = || AttestError::InvalidUri(text.to_string());
        let rest = text.strip_prefix(SCHEME).ok_or_else(invalid)?;
        let (alg, digest) = rest.split_once('/').ok_or_else(invalid)?;
        let alg: DigestAlg = alg.parse().map_err(|_| invalid())?;
        let cid = Cid::new(alg, digest).map_err(|_| invalid())?;
        Ok(Self { cid })
    }

    /// Identifier of the envelope bytes.
    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    /// Digest algorithm named by the URI.
    pub fn alg(&self) -> DigestAlg {
        self.cid.alg
    }
}

impl fmt::Display for AttestationUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", SCHEME, self.cid.alg, self.cid.digest)
    }
}

impl FromStr for AttestationUri {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AttestationUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttestationUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
