use thiserror::Error;

/// N-Triples syntax error with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    /// Line number.
    pub line: usize,
    /// Column (in characters).
    pub column: usize,
    /// What went wrong.
    pub message: String,
}
