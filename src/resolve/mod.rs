//! Resolution pipeline
//!
//! Turns the imported note model into a time-resolved, chronologically
//! ordered stream. Stages mutate the shared arena and leave every measure
//! re-sortable, so re-running the sort and time map is always safe and is how
//! later stages commit earlier edits.

pub mod fork;
pub mod grace;
pub mod group;
pub mod octave_shift;
pub mod overlap;
pub mod pedal;
pub mod sort;
pub mod tie;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EventKind, Score};

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that abort resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("measure {measure}: grace group {group} has {count} members, at least 3 required")]
    GraceGroupTooSmall {
        measure: u32,
        group: u32,
        count: usize,
    },

    #[error("measure {measure}: grace group {group} is malformed: {reason}")]
    GraceGroupMalformed {
        measure: u32,
        group: u32,
        reason: &'static str,
    },

    #[error("measure {measure} tick {tick}: fork begin without a matching end")]
    UnterminatedFork { measure: u32, tick: u64 },
}

/// Tunable knobs of the resolution pipeline. Loadable from JSON so a run can
/// override individual fields without restating the rest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ResolveSettings {
    /// How many measures past the last tie begin a continuation may appear.
    pub tie_slack_measures: u32,
    /// Performed length of a single grace note, in seconds.
    pub grace_seconds: f64,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        ResolveSettings {
            tie_slack_measures: 1,
            grace_seconds: 1.0 / 15.0,
        }
    }
}

impl ResolveSettings {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Run the full pipeline on an imported score, without patch application.
pub fn resolve(score: &mut Score, settings: &ResolveSettings) -> Result<()> {
    prepare(score, settings)?;
    for part_index in 0..score.parts.len() {
        grace::expand(score, part_index, settings)?;
        sort::sort_part(score, part_index);
        fork::interpolate(score, part_index)?;
        pedal::pair_pedals(score, part_index);
        sort::sort_part(score, part_index);
        overlap::resolve_overlaps(score, part_index);
        warn_dangling_section(score, part_index);
    }
    map_all(score);
    Ok(())
}

/// The pipeline prefix shared with patch application: octave shifts, sort,
/// time map, ties, overlaps and measurement grouping. Patch application (or
/// grace expansion, when there is no patch) takes over from here.
pub fn prepare(score: &mut Score, settings: &ResolveSettings) -> Result<()> {
    octave_shift::apply(score);
    for part_index in 0..score.parts.len() {
        sort::sort_part(score, part_index);
        sort::map_time(score, part_index);
        tie::resolve_ties(score, part_index, settings);
        sort::sort_part(score, part_index);
        sort::map_time(score, part_index);
        overlap::resolve_overlaps(score, part_index);
        group::assign_groups(score, part_index);
    }
    Ok(())
}

/// The pipeline suffix shared with patch application: pedal pairing, the
/// second overlap pass and the final time map.
pub fn finish(score: &mut Score, part_index: usize) -> Result<()> {
    pedal::pair_pedals(score, part_index);
    sort::sort_part(score, part_index);
    overlap::resolve_overlaps(score, part_index);
    warn_dangling_section(score, part_index);
    map_all(score);
    Ok(())
}

/// Final time map for every part, after all tick mutation is done.
pub fn map_all(score: &mut Score) {
    for part_index in 0..score.parts.len() {
        sort::map_time(score, part_index);
    }
}

/// A section label names the material that follows it. One left as the last
/// stamped event of a part has nothing left to name.
fn warn_dangling_section(score: &mut Score, part_index: usize) {
    let mut dangling: Option<(usize, u64, String)> = None;
    for id in score.parts[part_index].chain() {
        let note = score.arena.note(id);
        if !note.is_time_stamped() || note.is_bar() {
            continue;
        }
        dangling = match &note.kind {
            EventKind::Section { text } => Some((note.measure_index, note.tick, text.clone())),
            _ => None,
        };
    }
    if let Some((measure_index, tick, text)) = dangling {
        let measure_number = score.parts[part_index]
            .measures
            .get(measure_index)
            .map(|m| m.number);
        score.diagnostics.warn(
            "dangling_section",
            measure_number,
            Some(tick),
            format!("section label \"{}\" has no material after it", text),
        );
    }
}
