//! Spelled pitch representation
//!
//! A pitch is kept as written (letter, alteration, octave) so ties and the
//! patch language can match on spelling; the resolved MIDI-style number lives
//! on the event record and is what octave shifts mutate.

use serde::{Deserialize, Serialize};

/// Note letter (step) of a spelled pitch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Parse a step name as it appears in the document ("C".."B").
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "C" => Some(Letter::C),
            "D" => Some(Letter::D),
            "E" => Some(Letter::E),
            "F" => Some(Letter::F),
            "G" => Some(Letter::G),
            "A" => Some(Letter::A),
            "B" => Some(Letter::B),
            _ => None,
        }
    }

    /// Semitone offset from C within one octave.
    pub fn semitone(self) -> i16 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    /// Upper-case letter name.
    pub fn name(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

/// A spelled pitch: letter, semitone alteration (-2..=2), octave (C4 = middle C).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub letter: Letter,
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(letter: Letter, alter: i8, octave: i8) -> Self {
        Self {
            letter,
            alter,
            octave,
        }
    }

    /// Resolved MIDI-style note number (middle C = 60).
    ///
    /// Returned as `i16` because octave shifts are applied to the resolved
    /// number later and intermediate values may briefly leave 0..=127.
    pub fn midi(&self) -> i16 {
        self.letter.semitone() + self.alter as i16 + (self.octave as i16 + 1) * 12
    }

    /// Compact spelling used by the report and the patch `$` directive,
    /// e.g. `C4`, `C#4`, `Bb3`, `F##5`.
    pub fn spelling(&self) -> String {
        let accidental = match self.alter {
            -2 => "bb",
            -1 => "b",
            1 => "#",
            2 => "##",
            _ => "",
        };
        format!("{}{}{}", self.letter.name(), accidental, self.octave)
    }

    /// Parse a compact spelling. Accepts one letter, up to two `#`/`b`
    /// accidental characters, and a trailing octave number.
    pub fn parse_spelling(text: &str) -> Option<Self> {
        let first = text.chars().next()?;
        let letter = Letter::parse(&first.to_string())?;
        let rest = &text[first.len_utf8()..];

        let mut alter = 0i8;
        let mut consumed = 0;
        for c in rest.chars() {
            match c {
                '#' if alter >= 0 && alter < 2 => alter += 1,
                'b' if alter <= 0 && alter > -2 => alter -= 1,
                _ => break,
            }
            consumed += c.len_utf8();
        }

        let octave: i8 = rest[consumed..].parse().ok()?;
        Some(Pitch::new(letter, alter, octave))
    }
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.spelling())
    }
}
