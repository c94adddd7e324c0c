//! Compact JWS envelope: `b64(header).b64(payload).b64(signature)`.
//!
//! Header bytes are RFC 8785 canonical JSON and payload bytes are the stable
//! serialization of the claims, so the same claims signed by the same key
//! always yield the same envelope.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use canonical_json::to_string;
use kgen_canonical::{Canonicalizer, KeyId};
use kgen_keys::{KeyAlgorithm, KeySignature};
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationClaims;
use crate::error::AttestError;

/// `typ` header value of attestation envelopes.
pub const ENVELOPE_TYPE: &str = "kgen-attestation+jws";

/// Protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// JWS algorithm name (`EdDSA` or `RS256`).
    pub alg: String,
    /// Signing key id.
    pub kid: KeyId,
    /// Envelope type.
    pub typ: String,
}

impl JwsHeader {
    /// Header for a signature by `kid` with `algorithm`.
    pub fn new(algorithm: KeyAlgorithm, kid: KeyId) -> Self {
        Self {
            alg: algorithm.jws_alg().to_string(),
            kid,
            typ: ENVELOPE_TYPE.to_string(),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>, AttestError> {
        let value = serde_json::to_value(self)
            .map_err(|err| AttestError::MalformedEnvelope(err.to_string()))?;
        to_string(&value)
            .map(String::into_bytes)
            .map_err(|err| AttestError::MalformedEnvelope(err.to_string()))
    }
}

/// Header and payload segments awaiting a signature.
#[derive(Debug, Clone)]
pub struct UnsignedEnvelope {
    header: JwsHeader,
    signing_input: String,
}

impl UnsignedEnvelope {
    /// Encodes `claims` under `header`.
    pub fn new(
        header: JwsHeader,
        claims: &AttestationClaims,
        canonicalizer: &Canonicalizer,
    ) -> Result<Self, AttestError> {
        let payload = canonicalizer.to_bytes(claims)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_bytes()?),
            URL_SAFE_NO_PAD.encode(payload)
        );
        Ok(Self {
            header,
            signing_input,
        })
    }

    /// Protected header.
    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    /// Bytes the signature covers.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Appends the signature segment.
    pub fn seal(self, signature: &KeySignature) -> String {
        format!(
            "{}.{}",
            self.signing_input,
            URL_SAFE_NO_PAD.encode(&signature.value)
        )
    }
}

/// Parsed envelope.
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    /// Protected header.
    pub header: JwsHeader,
    /// Decoded claims.
    pub claims: AttestationClaims,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
    signing_input: String,
}

impl DecodedEnvelope {
    /// Splits and decodes a compact envelope.
    pub fn decode(envelope: &str) -> Result<Self, AttestError> {
        let mut parts = envelope.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected three segments"));
        };

        let header_bytes = segment(header, "header")?;
        let header: JwsHeader = serde_json::from_slice(&header_bytes)
            .map_err(|err| malformed(format!("header: {}", err)))?;
        let claims: AttestationClaims = serde_json::from_slice(&segment(payload, "payload")?)
            .map_err(|err| malformed(format!("payload: {}", err)))?;
        let signature = segment(signature, "signature")?;
        if signature.is_empty() {
            return Err(malformed("empty signature"));
        }

        let (signing_input, _) = envelope
            .rsplit_once('.')
            .ok_or_else(|| malformed("expected three segments"))?;
        Ok(Self {
            header,
            claims,
            signature,
            signing_input: signing_input.to_string(),
        })
    }

    /// Bytes the signature covers.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Signature as stored in the attestation record.
    pub fn signature_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.signature)
    }
}

fn segment(text: &str, name: &str) -> Result<Vec<u8>, AttestError> {
    URL_SAFE_NO_PAD
        .decode(text.as_bytes())
        .map_err(|err| malformed(format!("{} encoding: {}", name, err)))
}

fn malformed(message: impl Into<String>) -> AttestError {
    AttestError::MalformedEnvelope(message.into())
}
