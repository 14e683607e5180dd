//! Patch text parser
//!
//! Line-oriented scan producing one [`MeasureBatch`] per `measure N:` header.
//! Event lines carry the fixed-width composite key in columns 0..40 and a free
//! tail. Tail tokens led by a sentinel character are directives; a literal `|`
//! ends directive scanning and everything after it is commentary (the emitted
//! report puts its own description there).

use crate::models::{DynamicMark, GracePolicy, NoteId, PedalAction, PedalKind, Pitch, Tick};

use super::{PatchError, Result};

/// Composite key identifying one event line against the live model.
#[derive(Clone, Debug, PartialEq)]
pub struct EventKey {
    /// Position in the measure's sorted chain.
    pub index: usize,
    /// 0 = voiceless (blank column).
    pub voice: u8,
    /// Arena id.
    pub id: NoteId,
    pub tick: Tick,
    pub duration: Tick,
    /// Rhythmic wire code; None for events without one.
    pub code: Option<i32>,
    /// Pitch spelling as printed; None when the column is blank.
    pub pitch: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForkRole {
    Begin,
    End,
}

/// A `!` directive: dynamic value plus optional fork role.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicEdit {
    pub level: u8,
    pub velocity: u8,
    pub fork: Option<ForkRole>,
}

/// A `%` directive: grace-group membership for this line.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GraceEdit {
    pub begin: bool,
    pub interior: bool,
    pub policy: Option<GracePolicy>,
    /// Count of `1` letters: offset from the running group-id counter.
    pub bump: u32,
    /// Trailing `%`: advance the counter for subsequent lines.
    pub advance: bool,
}

impl GraceEdit {
    /// Whether this edit makes the note a group member at all.
    pub fn joins(&self) -> bool {
        self.begin || self.interior || self.policy.is_some()
    }
}

/// One parsed event line.
#[derive(Clone, Debug, PartialEq)]
pub struct EditRecord {
    /// 1-based source line, for error reporting.
    pub line: usize,
    pub key: EventKey,
    pub delete: bool,
    pub tie_end: bool,
    /// Synthesized pedal events, in directive order.
    pub pedals: Vec<(PedalKind, PedalAction)>,
    pub dynamic: Option<DynamicEdit>,
    pub new_tick: Option<Tick>,
    pub new_pitch: Option<Pitch>,
    pub grace: Option<GraceEdit>,
}

impl EditRecord {
    fn new(line: usize, key: EventKey) -> Self {
        EditRecord {
            line,
            key,
            delete: false,
            tie_end: false,
            pedals: Vec::new(),
            dynamic: None,
            new_tick: None,
            new_pitch: None,
            grace: None,
        }
    }
}

/// All event lines under one `measure N:` header.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureBatch {
    pub line: usize,
    pub number: u32,
    pub records: Vec<EditRecord>,
}

pub fn parse_patch(text: &str) -> Result<Vec<MeasureBatch>> {
    let mut batches: Vec<MeasureBatch> = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("measure ") {
            let number = rest
                .strip_suffix(':')
                .and_then(|n| n.trim().parse::<u32>().ok())
                .ok_or_else(|| PatchError::MalformedHeader {
                    line,
                    text: trimmed.to_string(),
                })?;
            batches.push(MeasureBatch {
                line,
                number,
                records: Vec::new(),
            });
            continue;
        }
        match batches.last_mut() {
            Some(batch) => batch.records.push(parse_event_line(raw, line)?),
            None => return Err(PatchError::MissingHeader { line }),
        }
    }
    Ok(batches)
}

/// Slice one fixed-width column, tolerating short lines.
fn column(raw: &str, start: usize, end: usize) -> &str {
    let len = raw.len();
    raw.get(start.min(len)..end.min(len)).unwrap_or("").trim()
}

fn parse_event_line(raw: &str, line: usize) -> Result<EditRecord> {
    let numeric = |field: &'static str, text: &str| -> Result<u64> {
        text.parse::<u64>()
            .map_err(|_| PatchError::MalformedKey { line, field })
    };

    let index = numeric("index", column(raw, 0, 4))? as usize;
    let voice_text = column(raw, 5, 8);
    let voice = if voice_text.is_empty() {
        0
    } else {
        voice_text.parse::<u8>().map_err(|_| PatchError::MalformedKey {
            line,
            field: "voice",
        })?
    };
    let id = numeric("location", column(raw, 9, 15))? as NoteId;
    let tick = numeric("tick", column(raw, 16, 23))?;
    let duration = numeric("duration", column(raw, 24, 30))?;
    let code_text = column(raw, 31, 35);
    let code = if code_text.is_empty() {
        None
    } else {
        Some(code_text.parse::<i32>().map_err(|_| PatchError::MalformedKey {
            line,
            field: "rhythm",
        })?)
    };
    let pitch_text = column(raw, 36, 40);
    let pitch = if pitch_text.is_empty() {
        None
    } else {
        Some(pitch_text.to_string())
    };

    let mut record = EditRecord::new(
        line,
        EventKey {
            index,
            voice,
            id,
            tick,
            duration,
            code,
            pitch,
        },
    );

    let tail = raw.get(40.min(raw.len())..).unwrap_or("");
    for token in tail.split_whitespace() {
        if token == "|" {
            break;
        }
        match token.as_bytes().first() {
            Some(b'~') => parse_roles(&mut record, token, line)?,
            Some(b'!') => record.dynamic = Some(parse_dynamic(token, line)?),
            Some(b'@') => {
                record.new_tick = Some(token[1..].parse::<Tick>().map_err(|_| {
                    PatchError::MalformedDirective {
                        line,
                        token: token.to_string(),
                    }
                })?)
            }
            Some(b'%') => record.grace = Some(parse_grace(token, line)?),
            Some(b'$') => {
                record.new_pitch =
                    Some(
                        Pitch::parse_spelling(&token[1..]).ok_or_else(|| {
                            PatchError::MalformedDirective {
                                line,
                                token: token.to_string(),
                            }
                        })?,
                    )
            }
            _ => {}
        }
    }
    Ok(record)
}

fn parse_roles(record: &mut EditRecord, token: &str, line: usize) -> Result<()> {
    let malformed = || PatchError::MalformedDirective {
        line,
        token: token.to_string(),
    };
    let letters = &token[1..];
    if letters.is_empty() {
        return Err(malformed());
    }
    for letter in letters.chars() {
        match letter {
            'd' => record.pedals.push((PedalKind::Sostenuto, PedalAction::Down)),
            'u' => record.pedals.push((PedalKind::Sostenuto, PedalAction::Up)),
            'x' => record.pedals.push((PedalKind::Sostenuto, PedalAction::UpDown)),
            'D' => record.pedals.push((PedalKind::Damper, PedalAction::Down)),
            'U' => record.pedals.push((PedalKind::Damper, PedalAction::Up)),
            '_' => record.tie_end = true,
            '&' => record.delete = true,
            _ => return Err(malformed()),
        }
    }
    Ok(())
}

fn parse_dynamic(token: &str, line: usize) -> Result<DynamicEdit> {
    let body = &token[1..];
    let (mark_text, double) = match body.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    let mark = DynamicMark::lookup(mark_text).ok_or_else(|| PatchError::MalformedDirective {
        line,
        token: token.to_string(),
    })?;
    let fork = if double {
        Some(ForkRole::End)
    } else if is_upper(mark_text) {
        Some(ForkRole::Begin)
    } else {
        None
    };
    Ok(DynamicEdit {
        level: mark.level,
        velocity: mark.velocity,
        fork,
    })
}

/// A mark token written in upper case opens a fork.
fn is_upper(text: &str) -> bool {
    let mut seen = false;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            if c.is_ascii_lowercase() {
                return false;
            }
            seen = true;
        }
    }
    seen
}

fn parse_grace(token: &str, line: usize) -> Result<GraceEdit> {
    let malformed = || PatchError::MalformedDirective {
        line,
        token: token.to_string(),
    };
    let mut body = &token[1..];
    let mut edit = GraceEdit::default();
    if let Some(stripped) = body.strip_suffix('%') {
        edit.advance = true;
        body = stripped;
    }
    if body.is_empty() && !edit.advance {
        return Err(malformed());
    }
    for letter in body.chars() {
        match letter {
            'b' => edit.begin = true,
            'g' => edit.interior = true,
            'a' | 's' | 'A' | 'n' => {
                if edit.policy.is_some() {
                    return Err(malformed());
                }
                edit.policy = GracePolicy::from_letter(letter);
            }
            '1' => edit.bump += 1,
            _ => return Err(malformed()),
        }
    }
    Ok(edit)
}
