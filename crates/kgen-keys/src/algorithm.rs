//! Supported signature algorithms and the key material behind them.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer as _, Verifier as _};
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::signature::{SignatureEncoding as _, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::KeyError;

/// Modulus size for generated RSA keys.
pub const RSA_BITS: usize = 2048;

/// Signature algorithm of a key. Fixed for the key's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum KeyAlgorithm {
    /// Ed25519 (JWS `EdDSA`).
    #[default]
    #[serde(rename = "ed25519")]
    Ed25519,
    /// RSA-2048 with PKCS#1 v1.5 and SHA-256 (JWS `RS256`).
    #[serde(rename = "rsa-2048")]
    Rsa2048,
}

impl KeyAlgorithm {
    /// Name used in key ids and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Rsa2048 => "rsa-2048",
        }
    }

    /// JWS `alg` header value.
    pub fn jws_alg(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "EdDSA",
            KeyAlgorithm::Rsa2048 => "RS256",
        }
    }

    /// Algorithm for a JWS `alg` header value.
    pub fn from_jws_alg(alg: &str) -> Option<Self> {
        match alg {
            "EdDSA" => Some(KeyAlgorithm::Ed25519),
            "RS256" => Some(KeyAlgorithm::Rsa2048),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" | "eddsa" => Ok(KeyAlgorithm::Ed25519),
            "rsa-2048" | "rsa2048" | "rsa" | "rs256" => Ok(KeyAlgorithm::Rsa2048),
            _ => Err(KeyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Hex SHA-256 of encoded public key bytes.
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(Sha256::digest(public_key))
}

/// Checks `signature` over `message` against an encoded public key.
///
/// Returns `Ok(false)` for a well-formed but wrong signature and an error
/// when the key bytes themselves cannot be decoded.
pub fn verify_signature(
    algorithm: KeyAlgorithm,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let bytes: [u8; 32] = public_key
                .try_into()
                .map_err(|_| KeyError::Crypto("ed25519 public key length".into()))?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                .map_err(|err| KeyError::Crypto(err.to_string()))?;
            let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(key.verify(message, &sig).is_ok())
        }
        KeyAlgorithm::Rsa2048 => {
            let key = RsaPublicKey::from_pkcs1_der(public_key)
                .map_err(|err| KeyError::Crypto(err.to_string()))?;
            let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key);
            let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
                return Ok(false);
            };
            Ok(verifier.verify(message, &sig).is_ok())
        }
    }
}

/// Private key material. Never leaves the key manager.
pub(crate) enum SecretKey {
    Ed25519(ed25519_dalek::SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl SecretKey {
    pub(crate) fn generate(algorithm: KeyAlgorithm) -> Result<Self, KeyError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => Ok(SecretKey::Ed25519(ed25519_dalek::SigningKey::generate(
                &mut OsRng,
            ))),
            KeyAlgorithm::Rsa2048 => RsaPrivateKey::new(&mut OsRng, RSA_BITS)
                .map(|key| SecretKey::Rsa(Box::new(key)))
                .map_err(|err| KeyError::Crypto(err.to_string())),
        }
    }

    pub(crate) fn algorithm(&self) -> KeyAlgorithm {
        match self {
            SecretKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            SecretKey::Rsa(_) => KeyAlgorithm::Rsa2048,
        }
    }

    /// Raw 32 bytes for Ed25519, PKCS#1 DER for RSA.
    pub(crate) fn public_key_bytes(&self) -> Result<Vec<u8>, KeyError> {
        match self {
            SecretKey::Ed25519(key) => Ok(key.verifying_key().to_bytes().to_vec()),
            SecretKey::Rsa(key) => RsaPublicKey::from(key.as_ref())
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|err| KeyError::Crypto(err.to_string())),
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            SecretKey::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            SecretKey::Rsa(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.as_ref().clone());
                signer.sign(message).to_vec()
            }
        }
    }

    /// Encoded secret for the keystore.
    pub(crate) fn to_secret_bytes(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        match self {
            SecretKey::Ed25519(key) => Ok(Zeroizing::new(key.to_bytes().to_vec())),
            SecretKey::Rsa(key) => key
                .to_pkcs1_der()
                .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
                .map_err(|err| KeyError::Crypto(err.to_string())),
        }
    }

    pub(crate) fn from_secret_bytes(
        algorithm: KeyAlgorithm,
        bytes: &[u8],
    ) -> Result<Self, KeyError> {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let secret: Zeroizing<[u8; 32]> = Zeroizing::new(
                    bytes
                        .try_into()
                        .map_err(|_| KeyError::Crypto("ed25519 secret key length".into()))?,
                );
                Ok(SecretKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(
                    &secret,
                )))
            }
            KeyAlgorithm::Rsa2048 => RsaPrivateKey::from_pkcs1_der(bytes)
                .map(|key| SecretKey::Rsa(Box::new(key)))
                .map_err(|err| KeyError::Crypto(err.to_string())),
        }
    }
}
