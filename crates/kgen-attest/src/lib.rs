//! Signed provenance records for kgen artifacts.
//!
//! [`AttestationGenerator`] signs claims about a content identifier through
//! the key manager, wraps them in a compact JWS envelope and stores the
//! envelope under its own identifier. [`AttestationResolver`] takes an
//! `attest://` URI back to a decoded attestation and a [`Verdict`].

#![deny(missing_docs)]

/// Attestation records and claims.
pub mod attestation;
mod boundary;
/// Compact JWS envelopes.
pub mod envelope;
/// Attestation errors.
pub mod error;
/// Signing and storing.
pub mod generator;
/// Fetching and verifying.
pub mod resolver;
/// `attest://` references.
pub mod uri;

pub use attestation::{Attestation, AttestationClaims, AttestationSignature, TrustLink};
pub use envelope::{DecodedEnvelope, JwsHeader, UnsignedEnvelope, ENVELOPE_TYPE};
pub use error::AttestError;
pub use generator::{
    AttestationDefaults, AttestationGenerator, AttestationMetadata, GeneratedAttestation,
    DEFAULT_VALIDITY_DAYS,
};
pub use resolver::{AttestationResolver, Resolution, ResolverOptions, Verdict};
pub use uri::{AttestationUri, SCHEME};
