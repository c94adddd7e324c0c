use thiserror::Error;

/// Validation errors for canonical identifiers and digests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a digest has the wrong length for its algorithm.
    #[error("{field} has length {actual}, expected {expected}")]
    LengthMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Expected length in characters.
        expected: usize,
        /// Actual length in characters.
        actual: usize,
    },
    /// When an algorithm name is not recognised.
    #[error("unsupported algorithm '{0}'")]
    UnknownAlgorithm(String),
}
