//! Note-model builder
//!
//! Walks the parsed document part by part and measure by measure, allocating
//! one arena record per notated event. Measure start ticks accumulate across
//! the part, so every record carries a score-absolute tick from the start.
//! Octave-shift brackets are resolved into spans here; applying them to
//! pitches is the resolver's job.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::models::{
    EventKind, Letter, Measure, OctaveShiftAction, OctaveSpan, OnsetData, Part, PedalAction,
    PedalKind, Pitch, RhythmicValue, Score, Staff, Tick,
};

use super::{ImportError, Result};

/// Build the full note model from document text.
pub fn build_score(text: &str) -> Result<Score> {
    let doc = Document::parse(text).map_err(|e| ImportError::Xml(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(ImportError::UnexpectedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let names = part_names(&root);
    let mut score = Score::new();
    for part_node in root.children().filter(|n| n.tag_name().name() == "part") {
        let part = build_part(&mut score, &part_node, &names)?;
        score.parts.push(part);
    }
    Ok(score)
}

/// Display names from the part list, keyed by part id.
fn part_names(root: &Node) -> HashMap<String, String> {
    let mut names = HashMap::new();
    if let Some(list) = child(root, "part-list") {
        for score_part in list
            .children()
            .filter(|n| n.tag_name().name() == "score-part")
        {
            if let (Some(id), Some(name)) = (
                score_part.attribute("id"),
                child_text(&score_part, "part-name"),
            ) {
                names.insert(id.to_string(), name.trim().to_string());
            }
        }
    }
    names
}

/// Per-part builder state. Divisions and time signature persist until the
/// document restates them; open octave-shift brackets persist until their
/// stop endpoint or the end of the part.
struct PartState {
    part_index: usize,
    divisions: u32,
    beats: u32,
    beat_type: u32,
    next_start: Tick,
    open_shifts: Vec<OpenShift>,
}

struct OpenShift {
    number: u8,
    staff: Staff,
    span_index: usize,
}

fn build_part(
    score: &mut Score,
    node: &Node,
    names: &HashMap<String, String>,
) -> Result<Part> {
    let id = node.attribute("id").ok_or(ImportError::MissingElement {
        line: line_of(node),
        element: "part id attribute",
    })?;
    let name = names.get(id).cloned().unwrap_or_else(|| id.to_string());
    let mut part = Part::new(id, name);
    let mut state = PartState {
        part_index: score.parts.len(),
        divisions: 1,
        beats: 4,
        beat_type: 4,
        next_start: 0,
        open_shifts: Vec::new(),
    };

    for measure_node in node.children().filter(|n| n.tag_name().name() == "measure") {
        build_measure(score, &mut part, &mut state, &measure_node)?;
    }

    for open in state.open_shifts {
        let span = score.spans[open.span_index];
        let measure = part
            .measure_at(span.start_tick)
            .map(|i| part.measures[i].number);
        score.diagnostics.warn(
            "unterminated_octave_shift",
            measure,
            Some(span.start_tick),
            "octave-shift bracket never closed; its notes keep their written pitch",
        );
    }
    Ok(part)
}

fn build_measure(
    score: &mut Score,
    part: &mut Part,
    state: &mut PartState,
    node: &Node,
) -> Result<()> {
    let line = line_of(node);
    let number_text = node.attribute("number").ok_or(ImportError::MissingElement {
        line,
        element: "measure number attribute",
    })?;
    let number: u32 = number_text
        .parse()
        .map_err(|_| ImportError::InvalidValue {
            line,
            element: "measure number",
            value: number_text.to_string(),
        })?;

    let measure_index = part.measures.len();
    let start_tick = state.next_start;
    let mut measure = Measure::new(
        number,
        state.divisions,
        state.beats,
        state.beat_type,
        start_tick,
    );

    let bar = score
        .arena
        .alloc(EventKind::Bar, start_tick, 0, 0, Staff::Treble, measure_index);
    measure.push_voice(0, bar);

    // Single running position, rewound by backup; chord members reuse the
    // previous note's position instead of the cursor.
    let mut cursor = start_tick;
    let mut last_note_tick = start_tick;

    for child_node in node.children().filter(|n| n.is_element()) {
        match child_node.tag_name().name() {
            "attributes" => apply_attributes(state, &mut measure, &child_node)?,
            "note" => build_note(
                score,
                &mut measure,
                measure_index,
                &child_node,
                &mut cursor,
                &mut last_note_tick,
            )?,
            "backup" => {
                let text =
                    child_text(&child_node, "duration").ok_or(ImportError::MissingElement {
                        line: line_of(&child_node),
                        element: "duration",
                    })?;
                let divs: Tick = parse_value(&child_node, "duration", text)?;
                cursor = cursor.saturating_sub(divs).max(start_tick);
            }
            "direction" => build_direction(
                score,
                &mut measure,
                measure_index,
                state,
                &child_node,
                cursor,
            )?,
            _ => {}
        }
    }

    measure.rebuild_sorted(&score.arena);
    state.next_start = start_tick + measure.nominal_length();
    part.measures.push(measure);
    Ok(())
}

fn apply_attributes(state: &mut PartState, measure: &mut Measure, node: &Node) -> Result<()> {
    if let Some(text) = child_text(node, "divisions") {
        let value: u32 = parse_value(node, "divisions", text)?;
        state.divisions = value;
        measure.divisions = value;
    }
    if let Some(time) = child(node, "time") {
        if let Some(text) = child_text(&time, "beats") {
            let value: u32 = parse_value(&time, "beats", text)?;
            state.beats = value;
            measure.beats = value;
        }
        if let Some(text) = child_text(&time, "beat-type") {
            let value: u32 = parse_value(&time, "beat-type", text)?;
            state.beat_type = value;
            measure.beat_type = value;
        }
    }
    Ok(())
}

fn build_note(
    score: &mut Score,
    measure: &mut Measure,
    measure_index: usize,
    node: &Node,
    cursor: &mut Tick,
    last_note_tick: &mut Tick,
) -> Result<()> {
    let line = line_of(node);
    let is_rest = has_child(node, "rest");
    let is_grace = has_child(node, "grace");
    let is_chord = has_child(node, "chord");

    let duration: Tick = match child_text(node, "duration") {
        Some(text) => parse_value(node, "duration", text)?,
        None if is_grace => 0,
        None => {
            return Err(ImportError::MissingElement {
                line,
                element: "duration",
            })
        }
    };

    let voice: u8 = match child_text(node, "voice") {
        Some(text) => parse_value(node, "voice", text)?,
        None => 1,
    };
    let staff = match child_text(node, "staff") {
        Some(text) => Staff::from_number(parse_value(node, "staff", text)?),
        None => Staff::Treble,
    };

    let rhythm = match child_text(node, "type") {
        Some(label) => {
            RhythmicValue::parse(label.trim()).ok_or_else(|| ImportError::UnknownRhythm {
                line,
                value: label.to_string(),
            })?
        }
        None if is_rest => RhythmicValue::MeasureRest,
        None => {
            return Err(ImportError::MissingElement {
                line,
                element: "type",
            })
        }
    };

    let tick = if is_chord { *last_note_tick } else { *cursor };

    let kind = if is_rest {
        EventKind::Rest { rhythm }
    } else {
        let pitch_node = child(node, "pitch").ok_or(ImportError::MissingElement {
            line,
            element: "pitch",
        })?;
        let step = child_text(&pitch_node, "step").ok_or(ImportError::MissingElement {
            line,
            element: "step",
        })?;
        let letter = Letter::parse(step.trim()).ok_or_else(|| ImportError::InvalidValue {
            line,
            element: "step",
            value: step.to_string(),
        })?;
        let alter: i8 = match child_text(&pitch_node, "alter") {
            Some(text) => parse_value(&pitch_node, "alter", text)?,
            None => 0,
        };
        let octave_text =
            child_text(&pitch_node, "octave").ok_or(ImportError::MissingElement {
                line,
                element: "octave",
            })?;
        let octave: i8 = parse_value(&pitch_node, "octave", octave_text)?;

        let mut data = OnsetData::new(Some(Pitch::new(letter, alter, octave)), rhythm);
        data.flags.dot = has_child(node, "dot");
        data.flags.chord = is_chord;
        data.flags.grace = is_grace;
        for tie in node.children().filter(|n| n.tag_name().name() == "tie") {
            match tie.attribute("type") {
                Some("start") => data.flags.tie_begin = true,
                Some("stop") => data.flags.tie_end = true,
                _ => {}
            }
        }
        data.flags.heel = child(node, "notations")
            .and_then(|n| child(&n, "technical"))
            .map(|t| has_child(&t, "heel"))
            .unwrap_or(false);
        if let Some(color) = node.attribute("color") {
            if !data.flags.apply_color(color) {
                score.diagnostics.warn(
                    "unknown_color",
                    Some(measure.number),
                    Some(tick),
                    format!("display color {} is not in the marker table", color),
                );
            }
        }
        EventKind::Onset(data)
    };

    let id = score
        .arena
        .alloc(kind, tick, duration, voice, staff, measure_index);
    measure.push_voice(voice, id);

    if !is_chord {
        *last_note_tick = tick;
        *cursor = tick + duration;
    }
    Ok(())
}

fn build_direction(
    score: &mut Score,
    measure: &mut Measure,
    measure_index: usize,
    state: &mut PartState,
    node: &Node,
    tick: Tick,
) -> Result<()> {
    let staff = match child_text(node, "staff") {
        Some(text) => Staff::from_number(parse_value(node, "staff", text)?),
        None => Staff::Treble,
    };

    // First recognized payload wins; the rest of the direction is ignored.
    for dtype in node.children().filter(|n| n.tag_name().name() == "direction-type") {
        for payload in dtype.children().filter(|n| n.is_element()) {
            let kind = match payload.tag_name().name() {
                "metronome" => Some(parse_metronome(&payload)?),
                "pedal" => Some(parse_pedal(&payload)?),
                "words" => parse_section(&payload)?,
                "octave-shift" => Some(parse_octave_shift(
                    score,
                    state,
                    &payload,
                    staff,
                    measure.number,
                    tick,
                )?),
                _ => None,
            };
            if let Some(kind) = kind {
                let id = score.arena.alloc(kind, tick, 0, 0, staff, measure_index);
                measure.push_voice(0, id);
                return Ok(());
            }
        }
    }
    Ok(())
}

fn parse_metronome(node: &Node) -> Result<EventKind> {
    let line = line_of(node);
    let unit_text = child_text(node, "beat-unit").ok_or(ImportError::MissingElement {
        line,
        element: "beat-unit",
    })?;
    let unit = RhythmicValue::parse(unit_text.trim()).ok_or_else(|| ImportError::UnknownRhythm {
        line,
        value: unit_text.to_string(),
    })?;
    let bpm_text = child_text(node, "per-minute").ok_or(ImportError::MissingElement {
        line,
        element: "per-minute",
    })?;
    let bpm: f64 = parse_value(node, "per-minute", bpm_text)?;
    Ok(EventKind::Metronome { unit, bpm })
}

fn parse_pedal(node: &Node) -> Result<EventKind> {
    let line = line_of(node);
    let action = match node.attribute("type") {
        Some("start") => PedalAction::Down,
        Some("change") => PedalAction::UpDown,
        Some("stop") => PedalAction::Up,
        Some(other) => {
            return Err(ImportError::UnknownPedal {
                line,
                value: other.to_string(),
            })
        }
        None => {
            return Err(ImportError::MissingElement {
                line,
                element: "pedal type attribute",
            })
        }
    };
    Ok(EventKind::Pedal {
        kind: PedalKind::Damper,
        action,
    })
}

/// Words are a section label only when boxed; anything else is stage text we
/// do not carry.
fn parse_section(node: &Node) -> Result<Option<EventKind>> {
    if node.attribute("enclosure") != Some("rectangle") {
        return Ok(None);
    }
    let text = node.text().unwrap_or("").trim();
    if text.is_empty() {
        return Err(ImportError::BlankSection {
            line: line_of(node),
        });
    }
    Ok(Some(EventKind::Section {
        text: text.to_string(),
    }))
}

fn parse_octave_shift(
    score: &mut Score,
    state: &mut PartState,
    node: &Node,
    staff: Staff,
    measure_number: u32,
    tick: Tick,
) -> Result<EventKind> {
    let line = line_of(node);
    let number: u8 = match node.attribute("number") {
        Some(text) => parse_value(node, "octave-shift number", text)?,
        None => 1,
    };
    let size: u8 = match node.attribute("size") {
        Some(text) => parse_value(node, "octave-shift size", text)?,
        None => 8,
    };
    let action = match node.attribute("type") {
        Some("up") => OctaveShiftAction::Up,
        Some("down") => OctaveShiftAction::Down,
        Some("stop") => OctaveShiftAction::Stop,
        Some(other) => {
            return Err(ImportError::UnknownOctaveShift {
                line,
                value: other.to_string(),
            })
        }
        None => {
            return Err(ImportError::MissingElement {
                line,
                element: "octave-shift type attribute",
            })
        }
    };

    match action {
        OctaveShiftAction::Up | OctaveShiftAction::Down => {
            // Any bracket size maps to one octave up or down.
            let offset = if action == OctaveShiftAction::Up { 12 } else { -12 };
            let span_index = score.spans.len();
            score.spans.push(OctaveSpan {
                part_index: state.part_index,
                staff,
                start_tick: tick,
                end_tick: Tick::MAX,
                offset,
            });
            state.open_shifts.push(OpenShift {
                number,
                staff,
                span_index,
            });
        }
        OctaveShiftAction::Stop => {
            let found = state.open_shifts.iter().rposition(|open| {
                open.number == number
                    && open.staff == staff
                    && score.spans[open.span_index].is_open()
            });
            match found {
                Some(pos) => {
                    let open = state.open_shifts.remove(pos);
                    score.spans[open.span_index].end_tick = tick;
                }
                None => score.diagnostics.warn(
                    "unmatched_octave_shift_stop",
                    Some(measure_number),
                    Some(tick),
                    "octave-shift stop without an open bracket",
                ),
            }
        }
    }
    Ok(EventKind::OctaveShift { action, size })
}

fn line_of(node: &Node) -> u32 {
    node.document().text_pos_at(node.range().start).row
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

fn child_text<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}

fn has_child(node: &Node, name: &str) -> bool {
    child(node, name).is_some()
}

fn parse_value<T: std::str::FromStr>(node: &Node, element: &'static str, text: &str) -> Result<T> {
    text.trim().parse().map_err(|_| ImportError::InvalidValue {
        line: line_of(node),
        element,
        value: text.to_string(),
    })
}
