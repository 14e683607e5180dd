//! Rhythmic-value vocabulary
//!
//! Closed set of rhythmic denominations as they appear in the document's
//! `type` child and the metronome beat unit. The integer wire code is what the
//! patch key and report carry: the reciprocal denomination, -1 for a
//! whole-measure rest, -2 for a breve (its reciprocal 1/2 has no integer form).

use num_rational::Rational32;
use serde::{Deserialize, Serialize};

/// Re-export used for rhythmic fractions throughout the crate.
pub type Rational = Rational32;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RhythmicValue {
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    HundredTwentyEighth,
    /// A rest filling its whole measure (no `type` child on a rest note).
    MeasureRest,
}

impl RhythmicValue {
    /// Parse a document rhythmic label ("whole", "16th", ...).
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "breve" => Some(RhythmicValue::Breve),
            "whole" => Some(RhythmicValue::Whole),
            "half" => Some(RhythmicValue::Half),
            "quarter" => Some(RhythmicValue::Quarter),
            "eighth" => Some(RhythmicValue::Eighth),
            "16th" => Some(RhythmicValue::Sixteenth),
            "32nd" => Some(RhythmicValue::ThirtySecond),
            "64th" => Some(RhythmicValue::SixtyFourth),
            "128th" => Some(RhythmicValue::HundredTwentyEighth),
            _ => None,
        }
    }

    /// Fraction of a whole note (breve = 2/1). None for a whole-measure rest,
    /// whose length depends on the time signature.
    pub fn fraction(self) -> Option<Rational> {
        match self {
            RhythmicValue::Breve => Some(Rational::new(2, 1)),
            RhythmicValue::Whole => Some(Rational::new(1, 1)),
            RhythmicValue::Half => Some(Rational::new(1, 2)),
            RhythmicValue::Quarter => Some(Rational::new(1, 4)),
            RhythmicValue::Eighth => Some(Rational::new(1, 8)),
            RhythmicValue::Sixteenth => Some(Rational::new(1, 16)),
            RhythmicValue::ThirtySecond => Some(Rational::new(1, 32)),
            RhythmicValue::SixtyFourth => Some(Rational::new(1, 64)),
            RhythmicValue::HundredTwentyEighth => Some(Rational::new(1, 128)),
            RhythmicValue::MeasureRest => None,
        }
    }

    /// Integer wire code used in the patch key and report.
    pub fn code(self) -> i32 {
        match self {
            RhythmicValue::Breve => -2,
            RhythmicValue::MeasureRest => -1,
            RhythmicValue::Whole => 1,
            RhythmicValue::Half => 2,
            RhythmicValue::Quarter => 4,
            RhythmicValue::Eighth => 8,
            RhythmicValue::Sixteenth => 16,
            RhythmicValue::ThirtySecond => 32,
            RhythmicValue::SixtyFourth => 64,
            RhythmicValue::HundredTwentyEighth => 128,
        }
    }

    /// Inverse of [`RhythmicValue::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -2 => Some(RhythmicValue::Breve),
            -1 => Some(RhythmicValue::MeasureRest),
            1 => Some(RhythmicValue::Whole),
            2 => Some(RhythmicValue::Half),
            4 => Some(RhythmicValue::Quarter),
            8 => Some(RhythmicValue::Eighth),
            16 => Some(RhythmicValue::Sixteenth),
            32 => Some(RhythmicValue::ThirtySecond),
            64 => Some(RhythmicValue::SixtyFourth),
            128 => Some(RhythmicValue::HundredTwentyEighth),
            _ => None,
        }
    }

    /// Length in quarter notes (4/reciprocal). Used for metronome beat units.
    pub fn quarters(self) -> Option<Rational> {
        self.fraction().map(|f| f * Rational::new(4, 1))
    }
}
