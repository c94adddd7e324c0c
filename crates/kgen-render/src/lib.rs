//! Deterministic template rendering for kgen.
//!
//! A template may substitute values from a canonicalized context and call
//! pure functions from an allow-list. Anything that could read the clock, a
//! random source or the process environment is rejected while parsing.

#![deny(missing_docs)]

/// Render errors.
pub mod error;
/// Allow-listed functions.
pub mod functions;
/// Rendering.
pub mod renderer;
/// Template parsing.
pub mod template;

pub use error::{ConstructCategory, RenderError};
pub use functions::{forbidden_category, FunctionDef, FunctionTable, InputScope, PureFn};
pub use renderer::{normalize_output, Renderer};
pub use template::Template;
