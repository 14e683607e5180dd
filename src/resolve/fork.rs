//! Dynamics-fork interpolation
//!
//! A fork is a pair of marked notes carrying explicit dynamics; every
//! sounding note strictly between them that has no dynamic of its own gets
//! a value interpolated linearly over tick distance. A begin marker with no
//! end marker is fatal: the score promised a ramp it never finished.

use crate::models::{NoteId, Score};

use super::{ResolveError, Result};

pub fn interpolate(score: &mut Score, part_index: usize) -> Result<()> {
    let chain: Vec<NoteId> = score.parts[part_index].chain().collect();

    let mut i = 0;
    while i < chain.len() {
        let note = score.arena.note(chain[i]);
        let is_begin = note
            .onset()
            .map(|o| o.sounding && o.flags.fork_begin)
            .unwrap_or(false);
        if !is_begin {
            i += 1;
            continue;
        }

        let begin_tick = note.tick;
        let begin_measure = note.measure_index;
        let begin_values = note.onset().map(|o| (o.dynamic, o.velocity));

        let mut end = None;
        for (offset, id) in chain[i + 1..].iter().enumerate() {
            let candidate = score.arena.note(*id);
            let is_end = candidate
                .onset()
                .map(|o| o.sounding && o.flags.fork_end)
                .unwrap_or(false);
            if is_end {
                end = Some((i + 1 + offset, candidate.tick));
                break;
            }
        }
        let (end_index, end_tick) = match end {
            Some(found) => found,
            None => {
                let measure = score.parts[part_index]
                    .measures
                    .get(begin_measure)
                    .map(|m| m.number)
                    .unwrap_or(0);
                return Err(ResolveError::UnterminatedFork {
                    measure,
                    tick: begin_tick,
                });
            }
        };

        let end_values = score.arena.note(chain[end_index]).onset().map(|o| (o.dynamic, o.velocity));
        if let (Some((d0, v0)), Some((d1, v1))) = (begin_values, end_values) {
            // Without values on both markers there is nothing to ramp.
            if v0 > 0 && v1 > 0 && end_tick > begin_tick {
                let span = (end_tick - begin_tick) as f64;
                for id in &chain[i + 1..end_index] {
                    let note = score.arena.note_mut(*id);
                    let tick = note.tick;
                    if let Some(onset) = note.onset_mut() {
                        if onset.sounding && onset.velocity == 0 {
                            let fraction = tick.saturating_sub(begin_tick) as f64 / span;
                            onset.velocity = lerp(v0, v1, fraction);
                            onset.dynamic = lerp(d0, d1, fraction);
                        }
                    }
                }
            }
        }

        i = end_index + 1;
    }
    Ok(())
}

fn lerp(from: u8, to: u8, fraction: f64) -> u8 {
    (from as f64 + (to as f64 - from as f64) * fraction).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import;
    use crate::models::DynamicMark;
    use crate::resolve::sort;

    fn imported(measures: &str) -> Score {
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
        let mut score = import::import_score(&xml).expect("import failed");
        sort::sort_part(&mut score, 0);
        score
    }

    fn set_mark(score: &mut Score, id: crate::models::NoteId, text: &str) {
        let mark = DynamicMark::lookup(text).unwrap();
        let onset = score.arena.note_mut(id).onset_mut().unwrap();
        onset.dynamic = mark.level;
        onset.velocity = mark.velocity;
    }

    #[test]
    fn test_interpolation_is_linear_and_bounded() {
        let mut score = imported(
            r##"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note color="#FF00FF"><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note color="#AA00AA"><pitch><step>F</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"##,
        );
        let ids: Vec<_> = score.parts[0].chain().skip(1).collect();
        set_mark(&mut score, ids[0], "p");
        set_mark(&mut score, ids[3], "f");
        interpolate(&mut score, 0).expect("fork failed");

        let p = DynamicMark::lookup("p").unwrap();
        let f = DynamicMark::lookup("f").unwrap();
        let velocities: Vec<u8> = ids
            .iter()
            .map(|id| score.arena.note(*id).onset().unwrap().velocity)
            .collect();
        assert_eq!(velocities[0], p.velocity);
        assert_eq!(velocities[3], f.velocity);
        for v in &velocities[1..3] {
            assert!(*v > p.velocity && *v < f.velocity);
        }
        assert!(velocities[1] < velocities[2]);
    }

    #[test]
    fn test_existing_values_are_kept() {
        let mut score = imported(
            r##"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note color="#FF00FF"><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note color="#AA00AA"><pitch><step>E</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"##,
        );
        let ids: Vec<_> = score.parts[0].chain().skip(1).collect();
        set_mark(&mut score, ids[0], "pp");
        set_mark(&mut score, ids[1], "fff");
        set_mark(&mut score, ids[2], "ff");
        interpolate(&mut score, 0).expect("fork failed");
        let middle = score.arena.note(ids[1]).onset().unwrap();
        assert_eq!(middle.velocity, DynamicMark::lookup("fff").unwrap().velocity);
    }

    #[test]
    fn test_unterminated_fork_is_fatal() {
        let mut score = imported(
            r##"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note color="#FF00FF"><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"##,
        );
        let err = interpolate(&mut score, 0).unwrap_err();
        assert!(matches!(err, ResolveError::UnterminatedFork { measure: 1, tick: 0 }));
    }

    #[test]
    fn test_fork_without_values_is_inert() {
        let mut score = imported(
            r##"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note color="#FF00FF"><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note color="#AA00AA"><pitch><step>E</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"##,
        );
        interpolate(&mut score, 0).expect("fork failed");
        let middle = score.parts[0].chain().nth(2).unwrap();
        assert_eq!(score.arena.note(middle).onset().unwrap().velocity, 0);
    }
}
