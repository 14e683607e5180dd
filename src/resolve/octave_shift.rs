//! Octave-shift application
//!
//! Importing a score leaves octave lines as recorded spans; sounding pitch
//! is only adjusted here, once, before any timing work. A span moves every
//! onset on its staff whose tick falls inside it by a whole octave. Open
//! spans were already diagnosed at import and are skipped.

use crate::models::Score;

pub fn apply(score: &mut Score) {
    let Score { arena, parts, spans, .. } = score;
    for span in spans.iter() {
        if span.is_open() {
            continue;
        }
        let part = match parts.get(span.part_index) {
            Some(part) => part,
            None => continue,
        };
        for id in part.chain() {
            let note = arena.note_mut(id);
            if note.staff != span.staff || !span.covers(note.tick) {
                continue;
            }
            if let Some(onset) = note.onset_mut() {
                onset.midi += span.offset;
                if let Some(pitch) = onset.pitch.as_mut() {
                    pitch.octave += (span.offset / 12) as i8;
                }
            }
        }
    }
    spans.retain(|span| span.is_open());
}
