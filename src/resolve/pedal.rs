//! Pedal pairing
//!
//! Each pedal kind holds one press at a time. A press followed by its
//! release turns into a single down event whose duration reaches the
//! release; an up-down at one position releases and presses again there.
//! Everything that breaks the alternation is a warning, never fatal.

use crate::models::{EventKind, NoteId, PedalAction, PedalKind, Score, Tick};

pub fn pair_pedals(score: &mut Score, part_index: usize) {
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();
    let mut slots: [Option<NoteId>; 2] = [None, None];

    for id in chain {
        let note = score.arena.note(id);
        let (kind, action) = match note.kind {
            EventKind::Pedal { kind, action } => (kind, action),
            _ => continue,
        };
        let tick = note.tick;
        let measure_index = note.measure_index;
        let slot = slot_index(kind);

        match action {
            PedalAction::Down => {
                if slots[slot].is_some() {
                    warn(
                        score,
                        part_index,
                        "reentrant_pedal",
                        measure_index,
                        tick,
                        format!("{:?} pedal pressed while already down", kind),
                    );
                }
                slots[slot] = Some(id);
            }
            PedalAction::Up => {
                match slots[slot].take() {
                    Some(down_id) => close(score, down_id, tick),
                    None => warn(
                        score,
                        part_index,
                        "unmatched_pedal_up",
                        measure_index,
                        tick,
                        format!("{:?} pedal released but was never pressed", kind),
                    ),
                }
            }
            PedalAction::UpDown => {
                match slots[slot].take() {
                    Some(down_id) => close(score, down_id, tick),
                    None => warn(
                        score,
                        part_index,
                        "unmatched_pedal_up",
                        measure_index,
                        tick,
                        format!("{:?} pedal change but it was never pressed", kind),
                    ),
                }
                slots[slot] = Some(id);
            }
        }
    }

    for slot in 0..slots.len() {
        if let Some(down_id) = slots[slot] {
            let note = score.arena.note(down_id);
            let (measure_index, tick) = (note.measure_index, note.tick);
            let kind = pedal_kind(slot);
            warn(
                score,
                part_index,
                "unterminated_pedal",
                measure_index,
                tick,
                format!("{:?} pedal still down at the end of the part", kind),
            );
        }
    }
}

fn slot_index(kind: PedalKind) -> usize {
    match kind {
        PedalKind::Damper => 0,
        PedalKind::Sostenuto => 1,
    }
}

fn pedal_kind(slot: usize) -> PedalKind {
    if slot == 0 {
        PedalKind::Damper
    } else {
        PedalKind::Sostenuto
    }
}

fn close(score: &mut Score, down_id: NoteId, up_tick: Tick) {
    let down = score.arena.note_mut(down_id);
    down.duration = up_tick.saturating_sub(down.tick);
}

fn warn(
    score: &mut Score,
    part_index: usize,
    kind: &str,
    measure_index: usize,
    tick: Tick,
    message: String,
) {
    let measure_number = score.parts[part_index]
        .measures
        .get(measure_index)
        .map(|m| m.number);
    score.diagnostics.warn(kind, measure_number, Some(tick), message);
}
