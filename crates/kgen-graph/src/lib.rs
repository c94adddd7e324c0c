//! Graph canonical form for kgen.
//!
//! Triples are relabeled so that isomorphic graphs serialize to the same
//! sorted N-Triples text, and therefore hash to the same content identifier.

#![deny(missing_docs)]

/// Blank node labeling and canonical serialization.
pub mod canonical;
/// Parse errors.
pub mod error;
/// N-Triples input.
pub mod ntriples;
/// Terms and triples.
pub mod term;

pub use canonical::{
    canonicalize_graph, CanonicalGraph, GraphCanonicalizer, CANONICAL_PREFIX, MAX_ROUNDS,
};
pub use error::ParseError;
pub use ntriples::parse_ntriples;
pub use term::{Term, Triple, XSD_STRING};
