//! Signing key management for kgen.
//!
//! Keys are created, used and retired through [`KeyManager`]. Private
//! material never leaves the manager; callers see [`KeyRecord`]s and
//! signatures. A revoked key can still verify what it signed before, but
//! cannot sign again.

#![deny(missing_docs)]

/// Algorithms, fingerprints and signature checks.
pub mod algorithm;
/// Time source.
pub mod clock;
/// Key errors.
pub mod error;
mod keystore;
/// The key table.
pub mod manager;
/// Key records and signatures.
pub mod record;
/// Seams used by attestation code.
pub mod traits;

pub use algorithm::{fingerprint, verify_signature, KeyAlgorithm, RSA_BITS};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{KeyError, Unavailability};
pub use manager::KeyManager;
pub use record::{KeyHandle, KeyRecord, KeySignature, KeyStatus, SignatureCheck};
pub use traits::KeyRing;
