//! Serializers for the resolved model
//!
//! Both exports walk the sorted measure chains of an already resolved score
//! and begin at a caller-specified bar number, so a patch touching only late
//! material can re-export just the tail.

pub mod midi;
pub mod table;

pub use midi::{write_midi, MidiError};
pub use table::render_table;
