//! End-to-end pipeline checks on small documents.

use notestream::resolve::ResolveSettings;
use notestream::{compile, CompileError, EventKind, Score};

fn document(measures: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
{}
  </part>
</score-partwise>"#,
        measures
    )
}

fn compiled(measures: &str) -> Score {
    compile(&document(measures), None, &ResolveSettings::default()).expect("compile failed")
}

fn onset_seconds(score: &Score, midi: i16) -> f64 {
    score.parts[0]
        .chain()
        .map(|id| score.arena.note(id))
        .find(|n| n.onset().map(|o| o.midi == midi).unwrap_or(false))
        .map(|n| n.seconds)
        .expect("onset not found")
}

#[test]
fn test_seconds_follow_the_metronome() {
    // quarter = 60 at 24 divisions per quarter puts the second measure's
    // downbeat note exactly one second in.
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>24</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>60</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>24</duration><type>quarter</type></note>
    </measure>
    <measure number="2">
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>24</duration><type>quarter</type></note>
    </measure>"#,
    );
    assert_eq!(score.parts[0].measures[1].start_tick, 24);
    assert!((onset_seconds(&score, 62) - 1.0).abs() < 1e-9);
    assert!((onset_seconds(&score, 60) - 0.0).abs() < 1e-9);
}

#[test]
fn test_cross_voice_overlap_shortens_the_earlier_note() {
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type><voice>1</voice></note>
      <backup><duration>280</duration></backup>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>500</duration><type>quarter</type><voice>2</voice></note>
    </measure>"#,
    );
    let measure = &score.parts[0].measures[0];
    let first = score.arena.note(measure.voices[&1][0]);
    let second = score.arena.note(measure.voices[&2][0]);
    assert_eq!(first.onset().unwrap().tied_duration, 200);
    assert!(first.is_sounding());
    assert_eq!(second.tick, 200);
    assert_eq!(second.onset().unwrap().tied_duration, 500);
}

#[test]
fn test_tie_chain_merges_into_the_head() {
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>960</duration><type>half</type><tie type="start"/></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>960</duration><type>half</type><tie type="stop"/></note>
    </measure>"#,
    );
    let onsets: Vec<_> = score.parts[0]
        .chain()
        .filter_map(|id| score.arena.note(id).onset().cloned())
        .collect();
    assert_eq!(onsets.len(), 2);
    assert!(onsets[0].sounding);
    assert_eq!(onsets[0].tied_duration, 1920);
    assert!(!onsets[1].sounding);
}

#[test]
fn test_open_octave_shift_warns_and_leaves_pitch_alone() {
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><octave-shift type="up" size="8"/></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
    );
    assert_eq!(
        score.diagnostics.of_kind("unterminated_octave_shift").count(),
        1
    );
    let onset = score.parts[0]
        .chain()
        .filter_map(|id| score.arena.note(id).onset().cloned())
        .next()
        .unwrap();
    assert_eq!(onset.midi, 60);
}

#[test]
fn test_trailing_section_label_warns() {
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <direction><direction-type><words enclosure="rectangle">coda</words></direction-type></direction>
    </measure>"#,
    );
    assert_eq!(score.diagnostics.of_kind("dangling_section").count(), 1);

    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><words enclosure="rectangle">coda</words></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>"#,
    );
    assert_eq!(score.diagnostics.of_kind("dangling_section").count(), 0);
}

#[test]
fn test_unknown_rhythmic_label_is_fatal() {
    let err = compile(
        &document(
            r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>donut</type></note>
    </measure>"#,
        ),
        None,
        &ResolveSettings::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Import(_)));
}

#[test]
fn test_sorted_chains_are_chronological_and_bar_led() {
    let score = compiled(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>960</duration><type>half</type><voice>1</voice></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>960</duration><type>half</type><voice>1</voice></note>
      <backup><duration>1920</duration></backup>
      <note><pitch><step>G</step><octave>3</octave></pitch><duration>480</duration><type>quarter</type><voice>2</voice></note>
      <note><pitch><step>A</step><octave>3</octave></pitch><duration>480</duration><type>quarter</type><voice>2</voice></note>
    </measure>"#,
    );
    let measure = &score.parts[0].measures[0];
    let ticks: Vec<_> = measure
        .sorted
        .iter()
        .map(|id| score.arena.note(*id).tick)
        .collect();
    let mut sorted = ticks.clone();
    sorted.sort();
    assert_eq!(ticks, sorted);
    match &score.arena.note(measure.sorted[0]).kind {
        EventKind::Bar => {}
        other => panic!("expected a bar first, found {:?}", other),
    }
}
