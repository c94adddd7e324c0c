//! Canonical data model primitives for kgen artifacts and attestations.
//!
//! Everything that participates in hashing lives in this crate: the
//! [`CanonicalValue`] tree, the serde-driven [`Canonicalizer`], the stable
//! byte serialization and the [`Cid`] content identifiers derived from it.
//! All functions are pure; identical logical input yields identical bytes on
//! any machine.
//!
#![deny(missing_docs)]

/// Canonicalization of arbitrary serializable data.
pub mod canonicalizer;
/// Content identifiers and hashing.
pub mod digest;
/// Hygiene report types emitted during canonicalization.
pub mod hygiene;
/// Core identifiers and newtypes.
pub mod identifiers;
/// Canonical number text.
pub mod number;
mod ser;
/// Validation helpers used by canonical types.
pub mod validation;
/// Canonical value tree and its stable serialization.
pub mod value;

pub use canonicalizer::{
    canonicalize, stable_bytes, CanonicalizationError, CanonicalizationResult, Canonicalizer,
    DEFAULT_PROFILE, MAX_DEPTH,
};
pub use digest::{deterministic_id, hash_bytes, hash_value, Cid, DigestAlg};
pub use hygiene::{HygieneReport, HygieneStatus, HygieneWarning};
pub use identifiers::{ContentRef, KeyId, ProfileId, Timestamp};
pub use number::CanonicalNumber;
pub use validation::ValidationError;
pub use value::{stable_serialize, CanonicalValue};
