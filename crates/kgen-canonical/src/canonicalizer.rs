use serde::Serialize;

use crate::digest::{hash_bytes, Cid, DigestAlg};
use crate::hygiene::{HygieneReport, HygieneStatus, HygieneWarning};
use crate::identifiers::ProfileId;
use crate::ser::{Context, ValueSerializer};
use crate::value::{stable_serialize, CanonicalValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Profile identifier used by [`Canonicalizer::default`].
pub const DEFAULT_PROFILE: &str = "kgen-canonical-v1";

/// Maximum container nesting accepted before input is treated as cyclic.
pub const MAX_DEPTH: usize = 128;

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalizationError {
    /// Input refers back to itself (or nests beyond [`MAX_DEPTH`]).
    #[error("cyclic input at {path}: nesting exceeds {limit} levels")]
    CyclicInput {
        /// Path where the limit was crossed.
        path: String,
        /// Depth limit in effect.
        limit: usize,
    },
    /// A value that has no canonical form.
    #[error("unsupported type at {path}: {reason}")]
    UnsupportedType {
        /// Path of the offending value.
        path: String,
        /// What was rejected.
        reason: String,
    },
    /// Two entries of one map collapse to the same canonical key.
    #[error("duplicate key detected at {0}")]
    DuplicateKey(String),
}

/// Result of canonicalization.
#[derive(Debug, Clone)]
pub struct CanonicalizationResult {
    /// Canonical value tree.
    pub value: CanonicalValue,
    /// Canonical UTF-8 bytes for the input value.
    pub bytes: Vec<u8>,
    /// Hygiene report describing stripped fields.
    pub report: HygieneReport,
}

/// Helper for building JSON paths in errors and reports.
#[derive(Debug, Clone)]
pub(crate) struct Path {
    segments: Vec<String>,
}

impl Path {
    pub(crate) fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub(crate) fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    pub(crate) fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "root");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 && !segment.starts_with('[') {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Canonicalizer that emits deterministic values and bytes.
///
/// Field names registered with [`Canonicalizer::with_ignored_fields`] are
/// removed at every nesting depth before keys are sorted, which is how
/// timestamps, nonces and random identifiers are kept out of content
/// addresses.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    profile: ProfileId,
    ignored_fields: BTreeSet<String>,
}

impl Canonicalizer {
    /// Creates a new canonicalizer for the provided profile.
    pub fn new(profile: ProfileId) -> Self {
        Self {
            profile,
            ignored_fields: BTreeSet::new(),
        }
    }

    /// Adds field names that are dropped wherever they occur.
    pub fn with_ignored_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Profile this canonicalizer reports.
    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    /// Field names stripped before sorting.
    pub fn ignored_fields(&self) -> impl Iterator<Item = &str> {
        self.ignored_fields.iter().map(String::as_str)
    }

    /// Produces the canonical value, its bytes and a hygiene report.
    pub fn canonicalize<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<CanonicalizationResult, CanonicalizationError> {
        self.canonicalize_with_report(value).map_err(|(err, _)| err)
    }

    /// Like [`Canonicalizer::canonicalize`], returning the report even on error.
    pub fn canonicalize_with_report<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<CanonicalizationResult, (CanonicalizationError, HygieneReport)> {
        let ctx = Context::new(&self.ignored_fields);
        let outcome = value
            .serialize(ValueSerializer::new(&ctx, Path::root(), 0))
            .map_err(|err| err.at(&Path::root()));
        let stripped = ctx.into_stripped();
        let mut report = self.report_for(&stripped);

        match outcome {
            Ok(value) => {
                let bytes = stable_serialize(&value);
                tracing::debug!(
                    profile = self.profile.as_ref(),
                    bytes = bytes.len(),
                    stripped = stripped.len(),
                    "canonicalized value"
                );
                Ok(CanonicalizationResult {
                    value,
                    bytes,
                    report,
                })
            }
            Err(err) => {
                report.status = HygieneStatus::Invalid;
                Err((err, report))
            }
        }
    }

    /// Canonical value only.
    pub fn to_value<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<CanonicalValue, CanonicalizationError> {
        self.canonicalize(value).map(|result| result.value)
    }

    /// Canonical bytes only.
    pub fn to_bytes<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, CanonicalizationError> {
        self.canonicalize(value).map(|result| result.bytes)
    }

    /// Content identifier of the canonical bytes of `value`.
    pub fn hash<T: Serialize + ?Sized>(
        &self,
        value: &T,
        alg: DigestAlg,
    ) -> Result<Cid, CanonicalizationError> {
        Ok(hash_bytes(&self.to_bytes(value)?, alg))
    }

    fn report_for(&self, stripped: &[String]) -> HygieneReport {
        let mut metrics = BTreeMap::new();
        let mut warnings = Vec::new();
        if !stripped.is_empty() {
            metrics.insert("stripped_fields".to_string(), stripped.len() as u64);
            warnings.extend(
                stripped
                    .iter()
                    .map(|path| HygieneWarning::at("StrippedField", path.clone())),
            );
        }
        HygieneReport {
            status: if stripped.is_empty() {
                HygieneStatus::Ok
            } else {
                HygieneStatus::Lossy
            },
            warnings,
            metrics,
            profile_id: self.profile.clone(),
        }
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(ProfileId::new(DEFAULT_PROFILE.to_string()))
    }
}

/// Canonicalizes `value` with the default profile and no ignored fields.
pub fn canonicalize<T: Serialize + ?Sized>(
    value: &T,
) -> Result<CanonicalValue, CanonicalizationError> {
    Canonicalizer::default().to_value(value)
}

/// Canonical bytes of `value` with the default profile.
pub fn stable_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalizationError> {
    Canonicalizer::default().to_bytes(value)
}
