//! Patch report emitter
//!
//! Writes the editable text form of one resolved part: the same fixed-width
//! key columns the parser reads back, plus a `| description` tail the parser
//! treats as commentary. Feeding an unedited report back through
//! `apply_patch` is a no-op on the model.

use crate::models::{EventKind, Note, OctaveShiftAction, PedalAction, PedalKind, Score};

pub fn render_report(score: &Score, part_index: usize) -> String {
    let part = &score.parts[part_index];
    let mut out = String::new();
    out.push_str(&format!("# part: {}\n", part.name));
    out.push_str("# index voice location tick duration rhythm pitch\n");
    for measure in &part.measures {
        out.push_str(&format!("measure {}:\n", measure.number));
        for (index, id) in measure.sorted.iter().enumerate() {
            out.push_str(&render_line(index, score.arena.note(*id)));
            out.push('\n');
        }
    }
    out
}

fn render_line(index: usize, note: &Note) -> String {
    let voice = if note.voice == 0 {
        String::new()
    } else {
        note.voice.to_string()
    };
    let (code, pitch) = match &note.kind {
        EventKind::Onset(onset) => (
            onset.rhythm.code().to_string(),
            onset
                .pitch
                .as_ref()
                .map(|p| p.spelling())
                .unwrap_or_default(),
        ),
        EventKind::Rest { rhythm } => (rhythm.code().to_string(), String::new()),
        _ => (String::new(), String::new()),
    };
    format!(
        "{:>4} {:>3} {:>6} {:>7} {:>6} {:>4} {:<4}| {}",
        index,
        voice,
        note.id,
        note.tick,
        note.duration,
        code,
        pitch,
        describe(note)
    )
}

fn describe(note: &Note) -> String {
    match &note.kind {
        EventKind::Bar => "bar".to_string(),
        EventKind::Rest { .. } => "rest".to_string(),
        EventKind::Onset(onset) => {
            let mut text = String::from("note");
            if !onset.sounding {
                text.push_str(" (silent)");
            } else if onset.tied_duration != note.duration {
                text.push_str(&format!(", sounds {} ticks", onset.tied_duration));
            }
            text
        }
        EventKind::Metronome { unit, bpm } => format!("metronome {}={}", unit.code(), bpm),
        EventKind::Pedal { kind, action } => {
            let kind = match kind {
                PedalKind::Damper => "damper",
                PedalKind::Sostenuto => "sostenuto",
            };
            let action = match action {
                PedalAction::Down => "down",
                PedalAction::Up => "up",
                PedalAction::UpDown => "change",
            };
            format!("{} {}", kind, action)
        }
        EventKind::Section { text } => format!("section {}", text),
        EventKind::OctaveShift { action, .. } => {
            let action = match action {
                OctaveShiftAction::Up => "up",
                OctaveShiftAction::Down => "down",
                OctaveShiftAction::Stop => "stop",
            };
            format!("octave shift {}", action)
        }
    }
}
