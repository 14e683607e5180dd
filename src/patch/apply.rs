//! Patch application
//!
//! Applies parsed edit records to the live model. Every record's composite
//! key must match the model exactly before any mutation in its measure batch
//! runs; mutations then apply in a fixed order (deletes, overrides, pedal
//! synthesis) and the measure's chains are rebuilt. After the last batch the
//! part is re-timed, bar-normalized, re-sorted, grace-expanded and
//! fork-interpolated, so measure-spanning groups written by the patch resolve
//! against final ticks.

use crate::models::{EventKind, NoteId, PedalAction, PedalKind, Score};
use crate::resolve::{fork, grace, sort, ResolveSettings};

use super::parser::{self, EditRecord, ForkRole, MeasureBatch};
use super::{PatchError, Result};

pub fn apply_patch(
    score: &mut Score,
    part_index: usize,
    text: &str,
    settings: &ResolveSettings,
) -> Result<()> {
    let batches = parser::parse_patch(text)?;
    let mut next_group = score.max_grace_group() + 1;
    for batch in &batches {
        apply_batch(score, part_index, batch, &mut next_group)?;
    }

    sort::map_time(score, part_index);
    normalize_bars(score, part_index);
    sort::sort_part(score, part_index);
    grace::expand(score, part_index, settings)?;
    sort::sort_part(score, part_index);
    fork::interpolate(score, part_index)?;
    Ok(())
}

fn apply_batch(
    score: &mut Score,
    part_index: usize,
    batch: &MeasureBatch,
    next_group: &mut u32,
) -> Result<()> {
    let measure_index = score.parts[part_index]
        .measures
        .iter()
        .position(|m| m.number == batch.number)
        .ok_or(PatchError::UnknownMeasure {
            line: batch.line,
            measure: batch.number,
        })?;

    // Match every key against the untouched measure before mutating anything.
    let mut matched: Vec<NoteId> = Vec::with_capacity(batch.records.len());
    for record in &batch.records {
        matched.push(resolve_key(score, part_index, measure_index, batch.number, record)?);
    }

    for (record, id) in batch.records.iter().zip(&matched) {
        if record.delete {
            score.parts[part_index].measures[measure_index].detach(*id);
        }
    }

    for (record, id) in batch.records.iter().zip(&matched) {
        if !record.delete {
            apply_overrides(score, record, *id, next_group);
        }
    }

    for (record, id) in batch.records.iter().zip(&matched) {
        if record.delete {
            continue;
        }
        for (kind, action) in &record.pedals {
            synthesize_pedal(score, part_index, measure_index, *id, *kind, *action);
        }
    }

    let Score { arena, parts, .. } = score;
    parts[part_index].measures[measure_index].rebuild_sorted(arena);
    Ok(())
}

fn resolve_key(
    score: &Score,
    part_index: usize,
    measure_index: usize,
    measure_number: u32,
    record: &EditRecord,
) -> Result<NoteId> {
    let unmatched = |reason: String| PatchError::UnmatchedKey {
        line: record.line,
        measure: measure_number,
        reason,
    };
    let key = &record.key;
    let measure = &score.parts[part_index].measures[measure_index];
    let id = measure
        .sorted
        .get(key.index)
        .copied()
        .ok_or_else(|| unmatched(format!("index {} is past the end of the measure", key.index)))?;
    if id != key.id {
        return Err(unmatched(format!(
            "location {} does not match the model's {}",
            key.id, id
        )));
    }
    let note = score.arena.note(id);
    if note.voice != key.voice {
        return Err(unmatched(format!(
            "voice {} does not match the model's {}",
            key.voice, note.voice
        )));
    }
    if note.tick != key.tick {
        return Err(unmatched(format!(
            "tick {} does not match the model's {}",
            key.tick, note.tick
        )));
    }
    if note.duration != key.duration {
        return Err(unmatched(format!(
            "duration {} does not match the model's {}",
            key.duration, note.duration
        )));
    }
    let code = match &note.kind {
        EventKind::Onset(onset) => Some(onset.rhythm.code()),
        EventKind::Rest { rhythm } => Some(rhythm.code()),
        _ => None,
    };
    if code != key.code {
        return Err(unmatched("rhythmic code does not match the model".to_string()));
    }
    if let Some(spelling) = &key.pitch {
        let actual = note
            .onset()
            .and_then(|o| o.pitch.as_ref())
            .map(|p| p.spelling());
        if actual.as_deref() != Some(spelling.as_str()) {
            return Err(unmatched(format!("pitch {} does not match the model", spelling)));
        }
    }
    Ok(id)
}

fn apply_overrides(score: &mut Score, record: &EditRecord, id: NoteId, next_group: &mut u32) {
    let note = score.arena.note_mut(id);
    if let Some(tick) = record.new_tick {
        note.tick = tick;
    }
    if let Some(onset) = note.onset_mut() {
        if record.tie_end {
            onset.flags.tie_end = true;
        }
        if let Some(pitch) = record.new_pitch {
            onset.midi = pitch.midi();
            onset.pitch = Some(pitch);
        }
        if let Some(dynamic) = record.dynamic {
            onset.dynamic = dynamic.level;
            onset.velocity = dynamic.velocity;
            match dynamic.fork {
                Some(ForkRole::Begin) => onset.flags.fork_begin = true,
                Some(ForkRole::End) => onset.flags.fork_end = true,
                None => {}
            }
        }
        if let Some(edit) = record.grace {
            if edit.joins() {
                onset.grace_group = *next_group + edit.bump;
            }
            if edit.begin {
                onset.flags.grace = true;
                onset.flags.grace_begin = true;
            }
            if edit.interior {
                onset.flags.grace = true;
            }
            if let Some(policy) = edit.policy {
                onset.grace_policy = Some(policy);
            }
        }
    }
    if let Some(edit) = record.grace {
        // Skip past every id this line minted, not just the base one.
        if edit.advance {
            *next_group += edit.bump + 1;
        }
    }
}

/// Insert a synthesized pedal record into the anchor's voice chain: a Down
/// immediately after the anchor, an Up (or change) immediately before it,
/// at the anchor's own tick. The stable rebuild keeps the adjacency.
fn synthesize_pedal(
    score: &mut Score,
    part_index: usize,
    measure_index: usize,
    anchor: NoteId,
    kind: PedalKind,
    action: PedalAction,
) {
    let (tick, voice, staff) = {
        let note = score.arena.note(anchor);
        (note.tick, note.voice, note.staff)
    };
    let id = score.arena.alloc(
        EventKind::Pedal { kind, action },
        tick,
        0,
        voice,
        staff,
        measure_index,
    );
    let measure = &mut score.parts[part_index].measures[measure_index];
    let chain = measure.voices.entry(voice).or_default();
    let position = chain.iter().position(|other| *other == anchor);
    match (position, action) {
        (Some(at), PedalAction::Down) => chain.insert(at + 1, id),
        (Some(at), _) => chain.insert(at, id),
        (None, _) => chain.push(id),
    }
}

fn normalize_bars(score: &mut Score, part_index: usize) {
    let Score { arena, parts, .. } = score;
    for measure in parts[part_index].measures.iter_mut() {
        measure.normalize_bar_first(arena);
    }
}
