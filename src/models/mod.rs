//! Data model for the compiled score
//!
//! This module contains the note records, the arena that owns them and the
//! closed vocabularies (pitch, rhythm, dynamics) the rest of the crate
//! resolves against.

pub mod dynamics;
pub mod event;
pub mod pitch;
pub mod rhythm;
pub mod score;

// Re-export commonly used types
pub use dynamics::DynamicMark;
pub use event::{
    EventKind, GracePolicy, Note, NoteId, OctaveShiftAction, OnsetData, PedalAction, PedalKind,
    RoleFlags, Staff, Tick,
};
pub use pitch::{Letter, Pitch};
pub use rhythm::{Rational, RhythmicValue};
pub use score::{Measure, NoteArena, OctaveSpan, Part, Score};
