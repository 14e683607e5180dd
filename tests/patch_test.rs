//! Patch-file round trips through the public pipeline.

use std::fs;
use std::io::Write as _;

use notestream::models::{DynamicMark, EventKind, PedalAction, PedalKind};
use notestream::patch::{render_report, PatchError};
use notestream::resolve::{self, ResolveSettings};
use notestream::{compile, import, CompileError, Note, Score};
use tempfile::NamedTempFile;

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

/// Report of the pre-patch model, the text an operator would hand-edit.
fn prepared_report(xml: &str) -> String {
    let mut score = import::import_score(xml).expect("import failed");
    resolve::prepare(&mut score, &ResolveSettings::default()).expect("prepare failed");
    render_report(&score, 0)
}

/// Insert a directive just before the commentary pipe on matching lines.
fn with_directive(report: &str, needle: &str, directive: &str) -> String {
    report
        .lines()
        .map(|line| {
            if line.contains(needle) {
                match line.find('|') {
                    Some(at) => format!("{}{} {}", &line[..at], directive, &line[at..]),
                    None => format!("{} {}", line, directive),
                }
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn find_note(score: &Score, spelling: &str) -> Note {
    score.parts[0]
        .chain()
        .map(|id| score.arena.note(id))
        .find(|n| {
            n.onset()
                .and_then(|o| o.pitch.as_ref())
                .map(|p| p.spelling() == spelling)
                .unwrap_or(false)
        })
        .cloned()
        .expect("onset not found")
}

const PLAIN: &str = r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>60</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
    </measure>
    <measure number="2">
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>1920</duration><type>whole</type></note>
    </measure>"#;

#[test]
fn test_unedited_report_round_trips() {
    let xml = document(PLAIN);
    let settings = ResolveSettings::default();
    let baseline = compile(&xml, None, &settings).expect("compile failed");
    let report = render_report(&baseline, 0);

    let again = compile(&xml, Some(&report), &settings).expect("patched compile failed");
    assert_eq!(render_report(&again, 0), report);
}

#[test]
fn test_grace_insert_relocates_members_and_shifts_the_rest() {
    let xml = document(
        r#"<measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>60</per-minute></metronome></direction-type></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>120</duration><type>16th</type></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>120</duration><type>16th</type></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>120</duration><type>16th</type></note>
      <note><rest/><duration>120</duration><type>16th</type></note>
      <note><pitch><step>F</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>480</duration><type>quarter</type></note>
      <note><rest/><duration>480</duration><type>quarter</type></note>
    </measure>
    <measure number="2">
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>1920</duration><type>whole</type></note>
    </measure>"#,
    );
    let report = prepared_report(&xml);
    let patched = with_directive(
        &with_directive(
            &with_directive(&with_directive(&report, "C4", "%b"), "D4", "%g"),
            "E4",
            "%g",
        ),
        "F4",
        "%a",
    );

    // Feed the edits back through an actual file.
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(patched.as_bytes()).expect("write failed");
    let text = fs::read_to_string(file.path()).expect("read failed");

    let score = compile(&xml, Some(&text), &ResolveSettings::default()).expect("compile failed");

    // A fifteenth of a second at 480 ticks per second is 32 ticks a grace.
    assert_eq!(find_note(&score, "C4").tick, 480);
    assert_eq!(find_note(&score, "D4").tick, 512);
    assert_eq!(find_note(&score, "E4").tick, 544);
    assert_eq!(find_note(&score, "C4").duration, 32);
    assert_eq!(find_note(&score, "F4").tick, 576);
    assert_eq!(find_note(&score, "G4").tick, 1056);
    assert_eq!(find_note(&score, "A4").tick, 2016);
    assert_eq!(score.parts[0].measures[1].start_tick, 2016);
}

#[test]
fn test_pedal_directives_synthesize_a_paired_press() {
    let xml = document(PLAIN);
    let report = prepared_report(&xml);
    let patched = with_directive(&with_directive(&report, "C4", "~D"), "G4", "~U");

    let score = compile(&xml, Some(&patched), &ResolveSettings::default()).expect("compile failed");
    let chain: Vec<_> = score.parts[0].chain().collect();
    let c4 = chain
        .iter()
        .position(|id| {
            score
                .arena
                .note(*id)
                .onset()
                .map(|o| o.midi == 60)
                .unwrap_or(false)
        })
        .unwrap();
    let g4 = chain
        .iter()
        .position(|id| {
            score
                .arena
                .note(*id)
                .onset()
                .map(|o| o.midi == 67)
                .unwrap_or(false)
        })
        .unwrap();

    let down = score.arena.note(chain[c4 + 1]);
    assert!(matches!(
        down.kind,
        EventKind::Pedal {
            kind: PedalKind::Damper,
            action: PedalAction::Down
        }
    ));
    assert_eq!(down.tick, 0);
    assert_eq!(down.duration, 960);

    let up = score.arena.note(chain[g4 - 1]);
    assert!(matches!(
        up.kind,
        EventKind::Pedal {
            kind: PedalKind::Damper,
            action: PedalAction::Up
        }
    ));
    assert_eq!(up.tick, 960);
}

#[test]
fn test_fork_marks_interpolate_the_span() {
    let xml = document(PLAIN);
    let report = prepared_report(&xml);
    let patched = with_directive(&with_directive(&report, "C4", "!F"), "G4", "!!p");

    let score = compile(&xml, Some(&patched), &ResolveSettings::default()).expect("compile failed");
    let loud = DynamicMark::lookup("f").unwrap();
    let soft = DynamicMark::lookup("p").unwrap();

    let begin = find_note(&score, "C4");
    let middle = find_note(&score, "E4");
    let end = find_note(&score, "G4");
    assert_eq!(begin.onset().unwrap().velocity, loud.velocity);
    assert_eq!(end.onset().unwrap().velocity, soft.velocity);

    let velocity = middle.onset().unwrap().velocity;
    assert!(velocity >= soft.velocity && velocity <= loud.velocity);
    assert_ne!(velocity, 0);
    let level = middle.onset().unwrap().dynamic;
    assert!(level >= soft.level && level <= loud.level);
}

#[test]
fn test_stale_key_aborts_the_patch() {
    let xml = document(PLAIN);
    let report = prepared_report(&xml);
    let stale: String = report
        .lines()
        .map(|line| {
            if line.contains("E4") {
                let mut edited = line.to_string();
                edited.replace_range(16..23, &format!("{:>7}", 999));
                edited
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let err = compile(&xml, Some(&stale), &ResolveSettings::default()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Patch(PatchError::UnmatchedKey { measure: 1, .. })
    ));
}
