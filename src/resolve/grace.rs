//! Grace-group expansion
//!
//! A grace group is a run of notes sharing a nonzero group id: an opening
//! grace flagged as the anchor, interior graces, and a closing full note that
//! carries the placement policy. Expansion gives every grace a real performed
//! length and a real tick, and, for the time-expanding policies, pushes the
//! rest of the score later to make room. Shifts move bar markers and measure
//! start ticks along with the notes, so the measure map stays consistent.
//!
//! Groups are expanded in ascending closing-tick order; an earlier group's
//! shift carries later groups along before they are expanded themselves.

use std::collections::BTreeMap;

use crate::models::{GracePolicy, NoteId, Score, Tick};

use super::{sort, ResolveError, ResolveSettings, Result};

struct Group {
    members: Vec<NoteId>,
    policy: GracePolicy,
}

pub fn expand(score: &mut Score, part_index: usize, settings: &ResolveSettings) -> Result<()> {
    let mut by_id: BTreeMap<u32, Vec<NoteId>> = BTreeMap::new();
    for id in score.parts[part_index].chain() {
        if let Some(onset) = score.arena.note(id).onset() {
            if onset.grace_group != 0 {
                by_id.entry(onset.grace_group).or_default().push(id);
            }
        }
    }

    // Validate every group before touching any tick.
    let mut groups: Vec<Group> = Vec::new();
    for (group_id, members) in by_id {
        let policy = validate_group(score, part_index, group_id, &members)?;
        groups.push(Group { members, policy });
    }

    groups.sort_by_key(|group| score.arena.note(group.members[group.members.len() - 1]).tick);
    for group in &groups {
        expand_group(score, part_index, group, settings);
    }

    // Ungrouped graces straight from the document keep their position, only
    // the length is normalized.
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();
    for id in chain {
        let note = score.arena.note(id);
        let plain_grace = note
            .onset()
            .map(|o| o.flags.grace && o.grace_group == 0)
            .unwrap_or(false);
        if !plain_grace {
            continue;
        }
        let tick = note.tick;
        let length = grace_length(score, part_index, tick, settings);
        set_length(score, id, length);
    }
    Ok(())
}

fn validate_group(
    score: &Score,
    part_index: usize,
    group: u32,
    members: &[NoteId],
) -> Result<GracePolicy> {
    let measure = members
        .first()
        .map(|id| measure_number(score, part_index, score.arena.note(*id).measure_index))
        .unwrap_or(0);
    if members.len() < 3 {
        return Err(ResolveError::GraceGroupTooSmall {
            measure,
            group,
            count: members.len(),
        });
    }
    let opens = score.arena.note(members[0])
        .onset()
        .map(|o| o.flags.grace_begin)
        .unwrap_or(false);
    if !opens {
        return Err(ResolveError::GraceGroupMalformed {
            measure,
            group,
            reason: "opening member is not flagged grace-begin",
        });
    }
    match score.arena.note(members[members.len() - 1]).onset() {
        Some(onset) if onset.flags.grace => Err(ResolveError::GraceGroupMalformed {
            measure,
            group,
            reason: "closing member is flagged grace",
        }),
        Some(onset) => onset.grace_policy.ok_or(ResolveError::GraceGroupMalformed {
            measure,
            group,
            reason: "closing member carries no policy",
        }),
        None => Err(ResolveError::GraceGroupMalformed {
            measure,
            group,
            reason: "closing member is not an onset",
        }),
    }
}

fn expand_group(score: &mut Score, part_index: usize, group: &Group, settings: &ResolveSettings) {
    let members = &group.members;
    let count = members.len() - 1;
    let grace_ids = &members[..count];
    let closing_id = members[count];

    let (begin_tick, closing_tick, closing_measure, voice) = {
        let opening = score.arena.note(members[0]);
        let closing = score.arena.note(closing_id);
        (opening.tick, closing.tick, closing.measure_index, closing.voice)
    };
    let length = grace_length(score, part_index, closing_tick, settings);
    let total = length * count as Tick;

    match group.policy {
        GracePolicy::Insert => {
            shift_later(score, members, closing_tick, true, total);
            place(score, grace_ids, closing_tick, length);
            score.arena.note_mut(closing_id).tick = closing_tick + total;
        }
        GracePolicy::Overlay => {
            if closing_tick < total {
                let measure = measure_number(score, part_index, closing_measure);
                score.diagnostics.warn(
                    "grace_overlay_underflow",
                    Some(measure),
                    Some(closing_tick),
                    format!("grace group needs {} ticks before tick {}", total, closing_tick),
                );
            } else {
                let start = closing_tick - total;
                place(score, grace_ids, start, length);
                borrow_from_preceding(score, part_index, members, voice, start, closing_tick);
            }
        }
        GracePolicy::AfterFirst => {
            shift_later(score, members, begin_tick, false, total);
            place(score, grace_ids, begin_tick, length);
            score.arena.note_mut(closing_id).tick = closing_tick + total;
        }
        GracePolicy::SoonAfterFirst => {
            shift_later(score, members, begin_tick, false, total + length);
            place(score, grace_ids, begin_tick + length, length);
            score.arena.note_mut(closing_id).tick = closing_tick + total + length;
        }
    }

    for id in grace_ids {
        set_length(score, *id, length);
    }
}

/// Performed length of one grace note in ticks at the given position. Before
/// the first metronome mark there is no seconds rate, so a sixteenth of the
/// local division count stands in.
fn grace_length(score: &Score, part_index: usize, tick: Tick, settings: &ResolveSettings) -> Tick {
    let rate = sort::ticks_per_second_at(score, part_index, tick);
    if rate > 0.0 {
        return ((settings.grace_seconds * rate).round() as Tick).max(1);
    }
    let part = &score.parts[part_index];
    let divisions = part
        .measure_at(tick)
        .and_then(|index| part.measures.get(index))
        .map(|m| m.divisions)
        .unwrap_or(1);
    (divisions as Tick / 4).max(1)
}

/// Move every non-member event at or past (`inclusive`) or strictly past the
/// threshold later by `amount`, across all parts, measure boundaries included.
fn shift_later(score: &mut Score, members: &[NoteId], threshold: Tick, inclusive: bool, amount: Tick) {
    for note in score.arena.notes_mut() {
        if members.contains(&note.id) {
            continue;
        }
        let past = if inclusive { note.tick >= threshold } else { note.tick > threshold };
        if past {
            note.tick += amount;
        }
    }
    for part in score.parts.iter_mut() {
        for measure in part.measures.iter_mut() {
            let past = if inclusive {
                measure.start_tick >= threshold
            } else {
                measure.start_tick > threshold
            };
            if past {
                measure.start_tick += amount;
            }
        }
    }
}

fn place(score: &mut Score, ids: &[NoteId], start: Tick, length: Tick) {
    for (i, id) in ids.iter().enumerate() {
        score.arena.note_mut(*id).tick = start + length * i as Tick;
    }
}

fn set_length(score: &mut Score, id: NoteId, length: Tick) {
    let note = score.arena.note_mut(id);
    note.duration = length;
    if let Some(onset) = note.onset_mut() {
        onset.tied_duration = length;
    }
}

/// Overlay borrows its time from whatever already sounds in the closing
/// member's voice: the nearest preceding sounding note is cut back to end
/// where the graces begin. A note that starts inside the grace span cannot be
/// cut back and is left alone with a warning.
fn borrow_from_preceding(
    score: &mut Score,
    part_index: usize,
    members: &[NoteId],
    voice: u8,
    start: Tick,
    closing_tick: Tick,
) {
    let mut candidate: Option<(NoteId, Tick, Tick)> = None;
    for id in score.parts[part_index].chain() {
        if members.contains(&id) {
            continue;
        }
        let note = score.arena.note(id);
        if note.voice != voice || note.tick >= closing_tick {
            continue;
        }
        let end = match note.onset() {
            Some(onset) if onset.sounding => note.tick + onset.tied_duration,
            _ => continue,
        };
        let nearer = candidate.map(|(_, tick, _)| note.tick >= tick).unwrap_or(true);
        if nearer {
            candidate = Some((id, note.tick, end));
        }
    }

    if let Some((id, tick, end)) = candidate {
        if end <= start {
            return;
        }
        if tick >= start {
            let measure = measure_number(score, part_index, score.arena.note(id).measure_index);
            score.diagnostics.warn(
                "grace_overlay_underflow",
                Some(measure),
                Some(tick),
                "preceding note is too short to absorb the grace group".to_string(),
            );
            return;
        }
        if let Some(onset) = score.arena.note_mut(id).onset_mut() {
            onset.tied_duration = start - tick;
        }
    }
}

fn measure_number(score: &Score, part_index: usize, measure_index: usize) -> u32 {
    score.parts[part_index]
        .measures
        .get(measure_index)
        .map(|m| m.number)
        .unwrap_or(0)
}
