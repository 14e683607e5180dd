//! Chronological sort and time map
//!
//! The sort is per measure: every voice chain merges into one ascending-tick
//! chain. The time map is one forward pass over the whole part, converting
//! absolute ticks to absolute seconds from the metronome markers seen so far.

use crate::models::{EventKind, Score, Tick};

/// Rebuild every measure's chronological chain in one part.
pub fn sort_part(score: &mut Score, part_index: usize) {
    let Score { arena, parts, .. } = score;
    parts[part_index].rebuild_all(arena);
}

/// Stamp `seconds` and `delta_seconds` on every time-stamped record of a
/// part. Before the first metronome marker the tick rate is unknown and all
/// times resolve to the score origin.
pub fn map_time(score: &mut Score, part_index: usize) {
    let Score { arena, parts, .. } = score;
    let part = &parts[part_index];

    let mut ticks_per_second = 0.0f64;
    let mut last_met_tick: Tick = 0;
    let mut last_met_seconds = 0.0f64;
    let mut previous_seconds = 0.0f64;

    for measure in &part.measures {
        for &id in &measure.sorted {
            let note = arena.note_mut(id);
            if note.is_time_stamped() {
                let seconds = if ticks_per_second > 0.0 {
                    note.tick.saturating_sub(last_met_tick) as f64 / ticks_per_second
                        + last_met_seconds
                } else {
                    last_met_seconds
                };
                note.delta_seconds = seconds - previous_seconds;
                note.seconds = seconds;
                previous_seconds = seconds;
            }
            if let EventKind::Metronome { unit, bpm } = &note.kind {
                // Rate holds from this marker until the next one.
                let quarters = unit
                    .quarters()
                    .map(|q| *q.numer() as f64 / *q.denom() as f64)
                    .unwrap_or(1.0);
                ticks_per_second = *bpm * quarters * measure.divisions as f64 / 60.0;
                last_met_tick = note.tick;
                last_met_seconds = note.seconds;
            }
        }
    }
}

/// Tick rate in effect at a position, from the last metronome marker at or
/// before it. 0.0 when no marker precedes the position.
pub fn ticks_per_second_at(score: &Score, part_index: usize, tick: Tick) -> f64 {
    let part = &score.parts[part_index];
    let mut rate = 0.0f64;
    for measure in &part.measures {
        for &id in &measure.sorted {
            let note = score.arena.note(id);
            if note.tick > tick {
                return rate;
            }
            if let EventKind::Metronome { unit, bpm } = &note.kind {
                let quarters = unit
                    .quarters()
                    .map(|q| *q.numer() as f64 / *q.denom() as f64)
                    .unwrap_or(1.0);
                rate = *bpm * quarters * measure.divisions as f64 / 60.0;
            }
        }
    }
    rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import;

    fn score_with(measures: &str) -> Score {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
{}
  </part>
</score-partwise>"#,
            measures
        );
        import::import_score(&xml).expect("import failed")
    }

    #[test]
    fn test_quarter_at_120_maps_half_second_per_quarter() {
        let mut score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
        );
        map_time(&mut score, 0);
        let measure = &score.parts[0].measures[0];
        let first = score.arena.note(measure.sorted[2]);
        let second = score.arena.note(measure.sorted[3]);
        assert!((first.seconds - 0.0).abs() < 1e-9);
        assert!((second.seconds - 0.5).abs() < 1e-9);
        assert!((second.delta_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_times_are_zero_before_first_marker() {
        let mut score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
        );
        map_time(&mut score, 0);
        for id in score.parts[0].chain() {
            assert_eq!(score.arena.note(id).seconds, 0.0);
        }
    }

    #[test]
    fn test_tempo_change_rescales_following_ticks() {
        let mut score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>960</duration><type>half</type></note>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>60</per-minute></metronome></direction-type></direction>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
        );
        map_time(&mut score, 0);
        let measure = &score.parts[0].measures[0];
        // chain: bar, met, C, met, D, E
        let d = score.arena.note(measure.sorted[4]);
        let e = score.arena.note(measure.sorted[5]);
        // half note at 120 bpm = 1.0 s, then quarters at 60 bpm = 1.0 s each
        assert!((d.seconds - 1.0).abs() < 1e-9);
        assert!((e.seconds - 2.0).abs() < 1e-9);
        assert!((e.delta_seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_eighth_beat_unit() {
        let mut score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>eighth</beat-unit><per-minute>120</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
        );
        map_time(&mut score, 0);
        // 120 eighths per minute = 60 quarters per minute
        let measure = &score.parts[0].measures[0];
        let second = score.arena.note(measure.sorted[3]);
        assert!((second.seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_resorting_an_unmutated_part_is_a_no_op() {
        let mut score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>960</duration><type>half</type><voice>1</voice></note>
      <backup><duration>960</duration></backup>
      <note><pitch><step>G</step><octave>3</octave></pitch><duration>480</duration><type>quarter</type><voice>2</voice></note>
      <note><pitch><step>A</step><octave>3</octave></pitch><duration>480</duration><type>quarter</type><voice>2</voice></note>
    </measure>"#,
        );
        sort_part(&mut score, 0);
        let before = score.parts[0].measures[0].sorted.clone();
        sort_part(&mut score, 0);
        assert_eq!(score.parts[0].measures[0].sorted, before);
    }

    #[test]
    fn test_rate_at_position() {
        let score = score_with(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type></direction>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
        );
        assert_eq!(ticks_per_second_at(&score, 0, 0), 0.0);
        assert!((ticks_per_second_at(&score, 0, 480) - 960.0).abs() < 1e-9);
        assert!((ticks_per_second_at(&score, 0, 9999) - 960.0).abs() < 1e-9);
    }
}
