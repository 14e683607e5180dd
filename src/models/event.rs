//! Event records
//!
//! One `Note` per notated event. What kind of event a record is lives in the
//! closed `EventKind` enum; only sounding material (`Onset`) carries the
//! performance payload. Every record shares the positional header: absolute
//! tick, duration, voice, staff and the index of its measure.

use serde::{Deserialize, Serialize};

use super::pitch::Pitch;
use super::rhythm::RhythmicValue;

/// Score-absolute time position in ticks (divisions accumulated across
/// measures). Tick 0 is the start of the first measure.
pub type Tick = u64;

/// Arena index of a note. Stable for the life of the score: deleting a note
/// detaches it from its chains but never reuses the slot.
pub type NoteId = u32;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Staff {
    Treble,
    Bass,
}

impl Staff {
    /// Map the document's staff number (1 = upper, 2 = lower).
    pub fn from_number(number: u8) -> Self {
        if number == 2 {
            Staff::Bass
        } else {
            Staff::Treble
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PedalKind {
    Damper,
    Sostenuto,
}

impl PedalKind {
    /// MIDI controller number carrying this pedal.
    pub fn controller(self) -> u8 {
        match self {
            PedalKind::Damper => 64,
            PedalKind::Sostenuto => 66,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PedalAction {
    Down,
    Up,
    /// Release-then-press at one position ("change").
    UpDown,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OctaveShiftAction {
    Up,
    Down,
    Stop,
}

/// Placement policy carried by the closing member of a grace group.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GracePolicy {
    /// Graces start at the closing member's position; later material moves.
    Insert,
    /// Graces end at the closing member's position; earlier material shrinks.
    Overlay,
    /// Graces start with the opening member; the rest of the group moves.
    AfterFirst,
    /// Like after-first but the graces themselves start one slot late.
    SoonAfterFirst,
}

impl GracePolicy {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'a' => Some(GracePolicy::Insert),
            's' => Some(GracePolicy::Overlay),
            'A' => Some(GracePolicy::AfterFirst),
            'n' => Some(GracePolicy::SoonAfterFirst),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            GracePolicy::Insert => 'a',
            GracePolicy::Overlay => 's',
            GracePolicy::AfterFirst => 'A',
            GracePolicy::SoonAfterFirst => 'n',
        }
    }
}

/// Notation roles attached to an onset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleFlags {
    pub dot: bool,
    pub chord: bool,
    pub tie_begin: bool,
    pub tie_end: bool,
    pub heel: bool,
    pub grace: bool,
    pub grace_begin: bool,
    pub fork_begin: bool,
    pub fork_end: bool,
    pub evenness_begin: bool,
    pub evenness_end: bool,
    pub dynamics_begin: bool,
    pub dynamics_end: bool,
    pub tempo_begin: bool,
    pub tempo_end: bool,
}

impl RoleFlags {
    /// Apply a display-color marker to the flags. The color vocabulary is
    /// fixed; returns false for a color outside it (caller warns).
    pub fn apply_color(&mut self, color: &str) -> bool {
        match color.to_ascii_uppercase().as_str() {
            "#FF0000" => self.evenness_begin = true,
            "#AA0000" => self.evenness_end = true,
            "#00FF00" => self.dynamics_begin = true,
            "#00AA00" => self.dynamics_end = true,
            "#0000FF" => self.tempo_begin = true,
            "#0000AA" => self.tempo_end = true,
            "#FF00FF" => self.fork_begin = true,
            "#AA00AA" => self.fork_end = true,
            _ => return false,
        }
        true
    }
}

/// Performance payload of a sounding (or once-sounding) note.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OnsetData {
    pub pitch: Option<Pitch>,
    /// Resolved MIDI-style number, octave shifts applied.
    pub midi: i16,
    /// Cleared when the note is absorbed by a tie or suppressed as an
    /// overlap duplicate.
    pub sounding: bool,
    /// Duration including every note absorbed by tie resolution, later
    /// clipped by overlap resolution.
    pub tied_duration: Tick,
    pub rhythm: RhythmicValue,
    /// Discrete dynamic level 1..=9; 0 = unset.
    pub dynamic: u8,
    /// Key velocity 1..=127; 0 = unset until fork interpolation or a mark.
    pub velocity: u8,
    pub flags: RoleFlags,
    /// Measurement group ids; 0 = not grouped.
    pub group_evenness: u32,
    pub group_dynamics: u32,
    pub group_tempo: u32,
    /// Grace group id; 0 = not in a group.
    pub grace_group: u32,
    /// Placement policy; set on the group's closing member only.
    pub grace_policy: Option<GracePolicy>,
    /// Notes absorbed into this head by tie resolution.
    pub tied_to: Vec<NoteId>,
}

impl OnsetData {
    pub fn new(pitch: Option<Pitch>, rhythm: RhythmicValue) -> Self {
        let midi = pitch.as_ref().map(|p| p.midi()).unwrap_or(0);
        OnsetData {
            pitch,
            midi,
            sounding: true,
            tied_duration: 0,
            rhythm,
            dynamic: 0,
            velocity: 0,
            flags: RoleFlags::default(),
            group_evenness: 0,
            group_dynamics: 0,
            group_tempo: 0,
            grace_group: 0,
            grace_policy: None,
            tied_to: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum EventKind {
    /// Synthesized marker at the start tick of every measure.
    Bar,
    Rest {
        rhythm: RhythmicValue,
    },
    Onset(OnsetData),
    Metronome {
        unit: RhythmicValue,
        bpm: f64,
    },
    Pedal {
        kind: PedalKind,
        action: PedalAction,
    },
    Section {
        text: String,
    },
    /// Endpoint of an octave-shift bracket; the resolved span lives on the
    /// score's span table.
    OctaveShift {
        action: OctaveShiftAction,
        size: u8,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub kind: EventKind,
    pub tick: Tick,
    /// Own duration in ticks. 0 for markers, directions and unexpanded
    /// graces; a paired pedal-down gets the distance to its release.
    pub duration: Tick,
    pub voice: u8,
    pub staff: Staff,
    /// Index of the owning measure within its part.
    pub measure_index: usize,
    /// Absolute performance time, set by the time mapper.
    pub seconds: f64,
    /// Seconds since the previous time-stamped event.
    pub delta_seconds: f64,
}

impl Note {
    pub fn new(
        id: NoteId,
        kind: EventKind,
        tick: Tick,
        duration: Tick,
        voice: u8,
        staff: Staff,
        measure_index: usize,
    ) -> Self {
        let mut note = Note {
            id,
            kind,
            tick,
            duration,
            voice,
            staff,
            measure_index,
            seconds: 0.0,
            delta_seconds: 0.0,
        };
        if let EventKind::Onset(ref mut onset) = note.kind {
            onset.tied_duration = duration;
        }
        note
    }

    pub fn onset(&self) -> Option<&OnsetData> {
        match &self.kind {
            EventKind::Onset(data) => Some(data),
            _ => None,
        }
    }

    pub fn onset_mut(&mut self) -> Option<&mut OnsetData> {
        match &mut self.kind {
            EventKind::Onset(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.onset().map(|o| o.sounding).unwrap_or(false)
    }

    pub fn is_bar(&self) -> bool {
        matches!(self.kind, EventKind::Bar)
    }

    /// Whether the time mapper stamps this record. Rests, octave-shift
    /// endpoints and silenced onsets keep their last stamped values.
    pub fn is_time_stamped(&self) -> bool {
        match &self.kind {
            EventKind::Bar
            | EventKind::Metronome { .. }
            | EventKind::Pedal { .. }
            | EventKind::Section { .. } => true,
            EventKind::Onset(onset) => onset.sounding,
            EventKind::Rest { .. } | EventKind::OctaveShift { .. } => false,
        }
    }
}
