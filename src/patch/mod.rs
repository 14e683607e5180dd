//! Patch language
//!
//! A patch is a hand-edited copy of the tabular report this module can emit
//! for any resolved part: `measure N:` headers, one fixed-width event line per
//! record, and whitespace-separated directive tokens appended after the key
//! columns. Parsing produces typed edit records per measure batch; application
//! is a separate pass over the live model, so a patch either applies whole or
//! fails without touching the score.

pub mod apply;
pub mod parser;
pub mod report;

use thiserror::Error;

use crate::resolve::ResolveError;

pub use apply::apply_patch;
pub use report::render_report;

/// Result type for patch operations
pub type Result<T> = std::result::Result<T, PatchError>;

/// Errors that abort patch application
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch line {line}: event line before any `measure N:` header")]
    MissingHeader { line: usize },

    #[error("patch line {line}: malformed measure header {text:?}")]
    MalformedHeader { line: usize, text: String },

    #[error("patch line {line}: measure {measure} is not in this part")]
    UnknownMeasure { line: usize, measure: u32 },

    #[error("patch line {line}: malformed {field} in event key")]
    MalformedKey { line: usize, field: &'static str },

    #[error("patch line {line} (measure {measure}): {reason}")]
    UnmatchedKey {
        line: usize,
        measure: u32,
        reason: String,
    },

    #[error("patch line {line}: malformed directive {token:?}")]
    MalformedDirective { line: usize, token: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
