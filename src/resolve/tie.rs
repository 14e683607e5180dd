//! Tie resolution
//!
//! A tie-begin note absorbs its continuation: the continuation stops
//! sounding and its duration joins the head's `tied_duration`. Chains are
//! transitive, so a continuation that is itself tie-begin extends the search.
//! The search is bounded a configurable number of measures past the last
//! tie begin seen, after which the head keeps its own duration and a warning
//! is recorded.

use crate::models::{NoteId, Score};

use super::ResolveSettings;

pub fn resolve_ties(score: &mut Score, part_index: usize, settings: &ResolveSettings) {
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();
    let slack = settings.tie_slack_measures as usize;

    for i in 0..chain.len() {
        let head_id = chain[i];
        let head = score.arena.note(head_id);
        let pitch = match head.onset() {
            Some(onset) if onset.sounding && onset.flags.tie_begin => match onset.pitch {
                Some(pitch) => pitch,
                None => continue,
            },
            _ => continue,
        };
        let voice = head.voice;

        // Position of the last tie begin in the chain under construction.
        let mut last_begin_measure = head.measure_index;
        let mut last_begin_tick = head.tick;
        let mut open = true;

        let mut j = i + 1;
        while j < chain.len() {
            let candidate = score.arena.note(chain[j]);
            if candidate.measure_index > last_begin_measure + slack {
                break;
            }
            let matches = candidate.voice == voice
                && candidate
                    .onset()
                    .map(|c| c.sounding && c.pitch == Some(pitch))
                    .unwrap_or(false);
            if matches {
                let candidate_id = chain[j];
                let candidate_duration = candidate.duration;
                let continues = candidate
                    .onset()
                    .map(|c| c.flags.tie_begin)
                    .unwrap_or(false);
                let candidate_measure = candidate.measure_index;
                let candidate_tick = candidate.tick;

                if let Some(absorbed) = score.arena.note_mut(candidate_id).onset_mut() {
                    absorbed.sounding = false;
                }
                if let Some(h) = score.arena.note_mut(head_id).onset_mut() {
                    h.tied_duration += candidate_duration;
                    h.tied_to.push(candidate_id);
                }

                if continues {
                    last_begin_measure = candidate_measure;
                    last_begin_tick = candidate_tick;
                } else {
                    open = false;
                    break;
                }
            }
            j += 1;
        }

        if open {
            let measure_number = score.parts[part_index]
                .measures
                .get(last_begin_measure)
                .map(|m| m.number);
            score.diagnostics.warn(
                "unterminated_tie",
                measure_number,
                Some(last_begin_tick),
                format!("no continuation found for tied {}", pitch),
            );
        }
    }

    // A tie-end note nothing absorbed points at a begin that never reached it.
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();
    for id in chain {
        let note = score.arena.note(id);
        let stray = note
            .onset()
            .map(|o| o.sounding && o.flags.tie_end && !o.flags.tie_begin)
            .unwrap_or(false);
        if stray {
            let measure_number = score.parts[part_index]
                .measures
                .get(note.measure_index)
                .map(|m| m.number);
            let (tick, pitch) = (note.tick, note.onset().and_then(|o| o.pitch));
            let label = pitch.map(|p| p.spelling()).unwrap_or_default();
            score.diagnostics.warn(
                "unmatched_tie_end",
                measure_number,
                Some(tick),
                format!("tie end on {} was never reached by a tie begin", label),
            );
        }
    }
}
