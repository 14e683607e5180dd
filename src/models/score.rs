//! Score container
//!
//! The `Score` owns every note record in one flat arena plus the part and
//! measure skeleton referencing them by id. Chains hold ids, never notes, so
//! every resolution stage can rebuild a measure's ordering wholesale without
//! touching the records themselves. The whole model is bulk-freed when the
//! score drops.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;

use super::event::{EventKind, Note, NoteId, Staff, Tick};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NoteArena {
    notes: Vec<Note>,
}

impl NoteArena {
    pub fn new() -> Self {
        NoteArena { notes: Vec::new() }
    }

    /// Allocate a record and return its id. Ids are assigned once and never
    /// reused; a deleted note stays in the arena, detached from all chains.
    pub fn alloc(
        &mut self,
        kind: EventKind,
        tick: Tick,
        duration: Tick,
        voice: u8,
        staff: Staff,
        measure_index: usize,
    ) -> NoteId {
        let id = self.notes.len() as NoteId;
        self.notes
            .push(Note::new(id, kind, tick, duration, voice, staff, measure_index));
        id
    }

    pub fn contains(&self, id: NoteId) -> bool {
        (id as usize) < self.notes.len()
    }

    pub fn note(&self, id: NoteId) -> &Note {
        &self.notes[id as usize]
    }

    pub fn note_mut(&mut self, id: NoteId) -> &mut Note {
        &mut self.notes[id as usize]
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut [Note] {
        &mut self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Octave-shift bracket resolved at import time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct OctaveSpan {
    pub part_index: usize,
    pub staff: Staff,
    pub start_tick: Tick,
    /// `Tick::MAX` while the bracket is still open.
    pub end_tick: Tick,
    /// Pitch offset in semitones, +12 or -12.
    pub offset: i16,
}

impl OctaveSpan {
    pub fn is_open(&self) -> bool {
        self.end_tick == Tick::MAX
    }

    pub fn covers(&self, tick: Tick) -> bool {
        !self.is_open() && tick >= self.start_tick && tick < self.end_tick
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Measure {
    /// Document bar number. Must be present and numeric.
    pub number: u32,
    /// Ticks per quarter note, inherited from the previous measure when the
    /// document does not restate it.
    pub divisions: u32,
    /// Time signature numerator.
    pub beats: u32,
    /// Time signature denominator.
    pub beat_type: u32,
    /// Score-absolute tick of the measure's first position.
    pub start_tick: Tick,
    /// Notation-order chains per voice. Voice 0 holds voiceless records (the
    /// bar marker and directions).
    pub voices: BTreeMap<u8, Vec<NoteId>>,
    /// Chronological merge of all voices, rebuilt after every mutation.
    pub sorted: Vec<NoteId>,
}

impl Measure {
    pub fn new(number: u32, divisions: u32, beats: u32, beat_type: u32, start_tick: Tick) -> Self {
        Measure {
            number,
            divisions,
            beats,
            beat_type,
            start_tick,
            voices: BTreeMap::new(),
            sorted: Vec::new(),
        }
    }

    /// Nominal measure length in ticks from the time signature.
    pub fn nominal_length(&self) -> Tick {
        (self.beats as Tick * self.divisions as Tick * 4) / self.beat_type as Tick
    }

    pub fn push_voice(&mut self, voice: u8, id: NoteId) {
        self.voices.entry(voice).or_default().push(id);
    }

    /// Rebuild the chronological chain from the voice chains. The sort is
    /// stable, so equal-tick records keep voice order (voice 0 first) and
    /// re-running on an unchanged measure is a no-op.
    pub fn rebuild_sorted(&mut self, arena: &NoteArena) {
        let mut chain: Vec<NoteId> = Vec::new();
        for ids in self.voices.values() {
            chain.extend(ids.iter().copied());
        }
        chain.sort_by_key(|id| arena.note(*id).tick);
        self.sorted = chain;
    }

    /// Force the bar marker to the chain head, preserving the relative order
    /// of everything else. Patched ticks may have sorted material before it.
    pub fn normalize_bar_first(&mut self, arena: &NoteArena) {
        if let Some(pos) = self.sorted.iter().position(|id| arena.note(*id).is_bar()) {
            if pos > 0 {
                let bar = self.sorted.remove(pos);
                self.sorted.insert(0, bar);
            }
        }
    }

    /// Detach a note from this measure's chains.
    pub fn detach(&mut self, id: NoteId) {
        for ids in self.voices.values_mut() {
            ids.retain(|other| *other != id);
        }
        self.sorted.retain(|other| *other != id);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Part {
    /// Document part id attribute.
    pub id: String,
    /// Display name from the part list; falls back to the id.
    pub name: String,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Part {
            id: id.into(),
            name: name.into(),
            measures: Vec::new(),
        }
    }

    /// Ids of every record in chronological order across all measures.
    pub fn chain(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.measures.iter().flat_map(|m| m.sorted.iter().copied())
    }

    pub fn rebuild_all(&mut self, arena: &NoteArena) {
        for measure in &mut self.measures {
            measure.rebuild_sorted(arena);
        }
    }

    /// Index of the measure owning a score-absolute tick.
    pub fn measure_at(&self, tick: Tick) -> Option<usize> {
        self.measures
            .iter()
            .rposition(|m| m.start_tick <= tick)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub arena: NoteArena,
    pub parts: Vec<Part>,
    pub spans: Vec<OctaveSpan>,
    pub diagnostics: Diagnostics,
}

impl Score {
    pub fn new() -> Self {
        Score::default()
    }

    /// Highest grace-group id in use; the patch interpreter numbers new
    /// groups from here.
    pub fn max_grace_group(&self) -> u32 {
        self.arena
            .notes()
            .iter()
            .filter_map(|n| n.onset())
            .map(|o| o.grace_group)
            .max()
            .unwrap_or(0)
    }
}
