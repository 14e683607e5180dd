//! MIDI-style rendering
//!
//! Writes the resolved score as a Format 1 SMF: a conductor track carrying
//! the tempo map, then one track per part. Note pairs use the tied duration,
//! so tie continuations never retrigger, and pedal presses become paired
//! controller events. Positions are tick offsets from the first emitted bar.

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use thiserror::Error;

use crate::models::{EventKind, NoteArena, Part, PedalAction, RhythmicValue, Score, Tick};

/// Key velocity used when no dynamic mark or fork ever reached a note.
const DEFAULT_VELOCITY: u8 = 64;

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("failed to write the event stream: {0}")]
    Write(String),
}

pub fn write_midi(score: &Score, start_bar: u32, out: &mut Vec<u8>) -> Result<(), MidiError> {
    let base = base_tick(score, start_bar);

    let mut tracks = Vec::new();
    tracks.push(conductor_track(score, start_bar, base));
    for (index, part) in score.parts.iter().enumerate() {
        let channel = (index % 16) as u8;
        tracks.push(part_track(&score.arena, part, start_bar, base, channel));
    }

    let header = Header {
        format: Format::Parallel,
        timing: Timing::Metrical(ticks_per_quarter(score, start_bar).into()),
    };
    let smf = Smf { header, tracks };
    smf.write(out).map_err(|e| MidiError::Write(e.to_string()))
}

/// Start tick of the first emitted bar, the zero point of every track.
fn base_tick(score: &Score, start_bar: u32) -> Tick {
    score
        .parts
        .iter()
        .filter_map(|part| {
            part.measures
                .iter()
                .find(|m| m.number >= start_bar)
                .map(|m| m.start_tick)
        })
        .min()
        .unwrap_or(0)
}

fn ticks_per_quarter(score: &Score, start_bar: u32) -> u16 {
    score
        .parts
        .iter()
        .filter_map(|part| part.measures.iter().find(|m| m.number >= start_bar))
        .map(|m| m.divisions as u16)
        .next()
        .unwrap_or(480)
}

fn conductor_track<'a>(score: &Score, start_bar: u32, base: Tick) -> Track<'a> {
    let mut events: Vec<TrackEvent> = Vec::new();
    for part in &score.parts {
        for measure in part.measures.iter().filter(|m| m.number >= start_bar) {
            for id in &measure.sorted {
                let note = score.arena.note(*id);
                if let EventKind::Metronome { unit, bpm } = &note.kind {
                    events.push(TrackEvent {
                        delta: (note.tick.saturating_sub(base) as u32).into(),
                        kind: TrackEventKind::Meta(MetaMessage::Tempo(
                            micros_per_quarter(*unit, *bpm).into(),
                        )),
                    });
                }
            }
        }
    }
    finish_track(&mut events);
    events
}

fn part_track<'a>(
    arena: &NoteArena,
    part: &'a Part,
    start_bar: u32,
    base: Tick,
    channel: u8,
) -> Track<'a> {
    let mut events: Vec<TrackEvent<'a>> = Vec::new();
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(part.name.as_bytes())),
    });

    for measure in part.measures.iter().filter(|m| m.number >= start_bar) {
        for id in &measure.sorted {
            let note = arena.note(*id);
            let tick = note.tick.saturating_sub(base) as u32;
            match &note.kind {
                EventKind::Onset(onset) if onset.sounding => {
                    let key = match key_number(onset.midi) {
                        Some(key) => key,
                        None => continue,
                    };
                    let vel = if onset.velocity == 0 {
                        DEFAULT_VELOCITY
                    } else {
                        onset.velocity
                    };
                    events.push(TrackEvent {
                        delta: tick.into(),
                        kind: TrackEventKind::Midi {
                            channel: channel.into(),
                            message: MidiMessage::NoteOn {
                                key: key.into(),
                                vel: vel.into(),
                            },
                        },
                    });
                    events.push(TrackEvent {
                        delta: (tick + onset.tied_duration as u32).into(),
                        kind: TrackEventKind::Midi {
                            channel: channel.into(),
                            message: MidiMessage::NoteOff {
                                key: key.into(),
                                vel: 0.into(),
                            },
                        },
                    });
                }
                EventKind::Pedal { kind, action } => {
                    // Up events are already folded into their press's duration.
                    if matches!(action, PedalAction::Up) || note.duration == 0 {
                        continue;
                    }
                    let controller = kind.controller();
                    events.push(control_event(channel, tick, controller, 127));
                    events.push(control_event(
                        channel,
                        tick + note.duration as u32,
                        controller,
                        0,
                    ));
                }
                _ => {}
            }
        }
    }

    finish_track(&mut events);
    events
}

fn control_event<'a>(channel: u8, tick: u32, controller: u8, value: u8) -> TrackEvent<'a> {
    TrackEvent {
        delta: tick.into(),
        kind: TrackEventKind::Midi {
            channel: channel.into(),
            message: MidiMessage::Controller {
                controller: controller.into(),
                value: value.into(),
            },
        },
    }
}

fn micros_per_quarter(unit: RhythmicValue, bpm: f64) -> u32 {
    let quarters = unit
        .quarters()
        .map(|q| *q.numer() as f64 / *q.denom() as f64)
        .unwrap_or(1.0);
    let quarter_bpm = bpm * quarters;
    if quarter_bpm <= 0.0 {
        return 500_000;
    }
    (60_000_000.0 / quarter_bpm) as u32
}

fn key_number(midi: i16) -> Option<u8> {
    if (0..=127).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Sort by the absolute ticks stashed in `delta`, rewrite them as deltas and
/// close the track.
fn finish_track(events: &mut Vec<TrackEvent>) {
    events.sort_by_key(|e| e.delta.as_int());
    let mut prev = 0u32;
    for event in events.iter_mut() {
        let tick = event.delta.as_int();
        event.delta = tick.saturating_sub(prev).into();
        prev = tick;
    }
    events.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
