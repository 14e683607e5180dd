//! Document import
//!
//! Turns notation-document text into the note model. The markup itself is
//! handled by `roxmltree`; this module only walks nodes and attributes.
//! Structural problems are fatal and carry the offending source line;
//! recoverable oddities land in the score's diagnostics instead.

pub mod builder;

use thiserror::Error;

use crate::models::Score;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors that abort document import
#[derive(Error, Debug)]
pub enum ImportError {
    /// Markup could not be parsed at all
    #[error("xml parse error: {0}")]
    Xml(String),

    /// Root element is not a partwise score
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    /// Required element or attribute missing
    #[error("line {line}: missing {element}")]
    MissingElement { line: u32, element: &'static str },

    /// Element or attribute present but unusable
    #[error("line {line}: invalid {element} value '{value}'")]
    InvalidValue {
        line: u32,
        element: &'static str,
        value: String,
    },

    /// Rhythmic label outside the closed vocabulary
    #[error("line {line}: unknown rhythmic value '{value}'")]
    UnknownRhythm { line: u32, value: String },

    /// Pedal type outside start/change/stop
    #[error("line {line}: unknown pedal type '{value}'")]
    UnknownPedal { line: u32, value: String },

    /// Octave-shift type outside up/down/stop
    #[error("line {line}: unknown octave-shift type '{value}'")]
    UnknownOctaveShift { line: u32, value: String },

    /// Section label with no text
    #[error("line {line}: section label is blank")]
    BlankSection { line: u32 },
}

/// Parse document text and build the note model.
///
/// # Arguments
///
/// * `text` - the notation document as a string
///
/// # Returns
///
/// A `Score` with per-voice chains, measure start ticks and octave-shift
/// spans resolved, ready for the resolution pipeline.
pub fn import_score(text: &str) -> Result<Score> {
    builder::build_score(text)
}
