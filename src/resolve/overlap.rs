//! Overlap and duplicate resolution
//!
//! Two sounding notes of the same resolved pitch must not overlap in time.
//! Duplicates at one location collapse to a single instance, a contained
//! later note is suppressed, and a partial overlap shortens the earlier
//! note to end where the later one begins.

use std::collections::BTreeMap;

use crate::models::{NoteId, Score, Tick};

struct Interval {
    id: NoteId,
    start: Tick,
    end: Tick,
    voice: u8,
    measure_index: usize,
}

pub fn resolve_overlaps(score: &mut Score, part_index: usize) {
    let mut by_pitch: BTreeMap<i16, Vec<Interval>> = BTreeMap::new();
    for id in score.parts[part_index].chain() {
        let note = score.arena.note(id);
        if let Some(onset) = note.onset() {
            if onset.sounding {
                by_pitch.entry(onset.midi).or_default().push(Interval {
                    id,
                    start: note.tick,
                    end: note.tick + onset.tied_duration,
                    voice: note.voice,
                    measure_index: note.measure_index,
                });
            }
        }
    }

    let mut suppress: Vec<NoteId> = Vec::new();
    let mut shorten: Vec<(NoteId, Tick)> = Vec::new();
    let mut same_voice: Vec<(usize, Tick)> = Vec::new();

    for intervals in by_pitch.values() {
        let mut ends: Vec<Tick> = intervals.iter().map(|i| i.end).collect();
        let mut alive = vec![true; intervals.len()];

        for k in 0..intervals.len() {
            if !alive[k] {
                continue;
            }
            for m in k + 1..intervals.len() {
                if !alive[m] {
                    continue;
                }
                let (a, b) = (&intervals[k], &intervals[m]);
                // chain order means starts never decrease
                if b.start >= ends[k] {
                    break;
                }
                if b.start == a.start {
                    alive[m] = false;
                    suppress.push(b.id);
                } else if ends[m] <= ends[k] {
                    alive[m] = false;
                    suppress.push(b.id);
                    if a.voice == b.voice {
                        same_voice.push((b.measure_index, b.start));
                    }
                } else {
                    shorten.push((a.id, b.start - a.start));
                    ends[k] = b.start;
                    break;
                }
            }
        }
    }

    for id in suppress {
        if let Some(onset) = score.arena.note_mut(id).onset_mut() {
            onset.sounding = false;
        }
    }
    for (id, tied_duration) in shorten {
        if let Some(onset) = score.arena.note_mut(id).onset_mut() {
            onset.tied_duration = tied_duration;
        }
    }
    for (measure_index, tick) in same_voice {
        let measure_number = score.parts[part_index]
            .measures
            .get(measure_index)
            .map(|m| m.number);
        score.diagnostics.warn(
            "overlap_suppressed",
            measure_number,
            Some(tick),
            "note suppressed by an overlapping note in its own voice",
        );
    }
}
