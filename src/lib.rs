//! notestream
//!
//! Compiles a hierarchical notation document into a time-resolved,
//! chronologically ordered note stream. The importer builds an arena-backed
//! note model, the resolution pipeline applies octave shifts, ties, overlap
//! suppression, grace expansion, dynamics forks and pedal pairing, and an
//! optional textual patch file lets an operator correct the model between
//! runs. The resolved stream exports as an editable report, a fixed-column
//! table or a MIDI-style event stream.

pub mod diagnostics;
pub mod export;
pub mod import;
pub mod models;
pub mod patch;
pub mod resolve;

use thiserror::Error;

// Re-export commonly used types
pub use models::{EventKind, Note, NoteId, Pitch, RhythmicValue, Score};
pub use resolve::ResolveSettings;

/// Umbrella error for a whole compilation run.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Import(#[from] import::ImportError),
    #[error(transparent)]
    Resolve(#[from] resolve::ResolveError),
    #[error(transparent)]
    Patch(#[from] patch::PatchError),
    #[error(transparent)]
    Midi(#[from] export::MidiError),
}

/// One-call pipeline: import the document, resolve it, and apply the patch
/// file when one is supplied. The patch targets the first part; other parts
/// get the ordinary no-patch tail.
pub fn compile(
    document: &str,
    patch_text: Option<&str>,
    settings: &ResolveSettings,
) -> Result<Score, CompileError> {
    let mut score = import::import_score(document)?;
    match patch_text {
        None => resolve::resolve(&mut score, settings)?,
        Some(text) => {
            resolve::prepare(&mut score, settings)?;
            for part_index in 0..score.parts.len() {
                if part_index == 0 {
                    patch::apply_patch(&mut score, part_index, text, settings)?;
                } else {
                    resolve::grace::expand(&mut score, part_index, settings)?;
                    resolve::sort::sort_part(&mut score, part_index);
                    resolve::fork::interpolate(&mut score, part_index)?;
                }
                resolve::finish(&mut score, part_index)?;
            }
        }
    }
    Ok(score)
}
