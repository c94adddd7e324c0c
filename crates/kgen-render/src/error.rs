use std::fmt;

use kgen_canonical::CanonicalizationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Family of a forbidden, non-deterministic construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructCategory {
    /// Wall-clock reads.
    Time,
    /// Random or unique value sources.
    Randomness,
    /// Process or host environment reads.
    Environment,
}

impl fmt::Display for ConstructCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstructCategory::Time => "time",
            ConstructCategory::Randomness => "randomness",
            ConstructCategory::Environment => "environment",
        })
    }
}

/// Errors raised while compiling or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Malformed template text.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax {
        /// Byte offset in the template.
        offset: usize,
        /// What went wrong.
        message: String,
    },
    /// Template names a time, randomness or environment primitive.
    #[error("non-deterministic construct `{name}` ({category}) at byte {offset}")]
    NonDeterministicConstruct {
        /// Function name as written.
        name: String,
        /// Family of the construct.
        category: ConstructCategory,
        /// Byte offset in the template.
        offset: usize,
    },
    /// Call to a name outside the function table.
    #[error("unknown function `{name}` at byte {offset}")]
    UnknownFunction {
        /// Function name as written.
        name: String,
        /// Byte offset in the template.
        offset: usize,
    },
    /// Path that does not resolve in the context.
    #[error("undefined variable `{path}` at byte {offset}")]
    UndefinedVariable {
        /// Path as written.
        path: String,
        /// Byte offset in the template.
        offset: usize,
    },
    /// Function applied to arguments it cannot handle.
    #[error("{function}: {message}")]
    InvalidArgument {
        /// Function name.
        function: String,
        /// What went wrong.
        message: String,
    },
    /// Context could not be canonicalized.
    #[error("context: {0}")]
    Context(#[from] CanonicalizationError),
}
